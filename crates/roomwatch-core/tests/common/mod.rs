// Shared fakes for the engine integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use roomwatch_api::{
    Connection, Connector, CoolingResponse, EnergyPointResponse, EnergyResponse, Error,
    FeedItemResponse, Inbound, ItemId, PushEvent, SecurityResponse, TemperatureResponse,
};
use roomwatch_core::{DashboardSource, Subscription, ViewModel};

// ── Fixture data ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Fixture {
    pub energy: EnergyResponse,
    pub temperature: TemperatureResponse,
    pub cooling: CoolingResponse,
    pub security: SecurityResponse,
}

pub fn feed_item(id: i64, message: &str, kind: &str) -> FeedItemResponse {
    FeedItemResponse {
        id: ItemId::Number(id),
        message: message.into(),
        time: "10:23 AM".into(),
        kind: kind.into(),
    }
}

impl Fixture {
    /// A small dashboard: two notifications, two alerts.
    pub fn dashboard() -> Self {
        let history = (5..=11)
            .zip([230.0, 245.0, 220.0, 260.0, 240.0, 210.0, 245.0])
            .map(|(day, value)| EnergyPointResponse {
                date: NaiveDate::from_ymd_opt(2025, 4, day).unwrap(),
                value,
            })
            .collect();

        Self {
            energy: EnergyResponse {
                current: 245.0,
                previous: 210.0,
                history,
            },
            temperature: TemperatureResponse {
                room_temp: 22.5,
                outdoor_temp: 28.3,
                predicted_temp: 29.0,
            },
            cooling: CoolingResponse {
                status: true,
                speed: 75.0,
            },
            security: SecurityResponse {
                notifications: vec![
                    feed_item(1, "Door opened", "normal"),
                    feed_item(2, "Motion detected", "normal"),
                ],
                alerts: vec![
                    feed_item(1, "Temperature above threshold", "warning"),
                    feed_item(2, "Unauthorized access attempt", "critical"),
                ],
                camera_status: true,
                camera_data: Some("/api/placeholder/640/360".into()),
                access_count: 15,
            },
        }
    }
}

// ── Fake source ─────────────────────────────────────────────────────

struct SourceState {
    fixture: Mutex<Fixture>,
    failing: Mutex<Option<&'static str>>,
    loads: AtomicUsize,
}

/// In-memory `DashboardSource`. Clones share state, so a test can change
/// what the engine sees after handing it a clone.
#[derive(Clone)]
pub struct FakeSource {
    state: Arc<SourceState>,
}

impl FakeSource {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            state: Arc::new(SourceState {
                fixture: Mutex::new(fixture),
                failing: Mutex::new(None),
                loads: AtomicUsize::new(0),
            }),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut Fixture)) {
        f(&mut self.state.fixture.lock().unwrap());
    }

    /// Make `resource` answer 503 (`None` to recover).
    pub fn fail(&self, resource: Option<&'static str>) {
        *self.state.failing.lock().unwrap() = resource;
    }

    /// Completed `energy` fetches, i.e. snapshot attempts.
    pub fn loads(&self) -> usize {
        self.state.loads.load(Ordering::SeqCst)
    }

    fn check(&self, resource: &'static str) -> Result<Fixture, Error> {
        if *self.state.failing.lock().unwrap() == Some(resource) {
            return Err(Error::Http {
                resource: resource.into(),
                status: 503,
            });
        }
        Ok(self.state.fixture.lock().unwrap().clone())
    }
}

impl DashboardSource for FakeSource {
    async fn energy(&self) -> Result<EnergyResponse, Error> {
        self.state.loads.fetch_add(1, Ordering::SeqCst);
        self.check("energy").map(|f| f.energy)
    }

    async fn temperature(&self) -> Result<TemperatureResponse, Error> {
        self.check("temperature").map(|f| f.temperature)
    }

    async fn cooling(&self) -> Result<CoolingResponse, Error> {
        self.check("cooling").map(|f| f.cooling)
    }

    async fn security(&self) -> Result<SecurityResponse, Error> {
        self.check("security").map(|f| f.security)
    }
}

// ── Fake push server ────────────────────────────────────────────────

/// Test side of a single push connection.
pub struct PushServer {
    frames: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
}

/// Engine side: hands out the one connection, then refuses.
pub struct PushConnector {
    pending: Mutex<Option<FakeConnection>>,
}

pub struct FakeConnection {
    frames: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
}

pub fn push_pair() -> (PushServer, PushConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    (
        PushServer {
            frames: tx,
            sent: Arc::clone(&sent),
        },
        PushConnector {
            pending: Mutex::new(Some(FakeConnection { frames: rx, sent })),
        },
    )
}

impl PushServer {
    pub fn open(&self) {
        self.raw(r#"0{"sid":"test","pingInterval":25000,"pingTimeout":20000}"#);
        self.raw("40");
    }

    pub fn emit(&self, event: &PushEvent) {
        self.raw(&event.to_frame());
    }

    pub fn raw(&self, text: &str) {
        self.frames.send(Inbound::Text(text.to_owned())).unwrap();
    }

    /// Frames the client sent back.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Connector for PushConnector {
    type Conn = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection, Error> {
        self.pending
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::WebSocketConnect("connection refused".into()))
    }
}

impl Connection for FakeConnection {
    async fn recv(&mut self) -> Option<Result<Inbound, Error>> {
        self.frames.recv().await.map(Ok)
    }

    async fn send(&mut self, text: String) -> Result<(), Error> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Wait for a delivered view matching `pred`.
pub async fn next_view(
    sub: &mut Subscription,
    pred: impl Fn(&ViewModel) -> bool,
) -> Arc<ViewModel> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = sub.recv().await.expect("subscription closed");
            if pred(&view) {
                return view;
            }
        }
    })
    .await
    .expect("timed out waiting for a matching view")
}
