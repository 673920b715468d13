//! Push event stream with auto-reconnect.
//!
//! Maintains one logical connection to the push endpoint and forwards
//! decoded [`PushEvent`]s, in arrival order, into an `mpsc` channel.
//! Reconnection uses capped exponential backoff and never gives up while
//! the stream is alive. The connection itself sits behind the
//! [`Connector`] / [`Connection`] traits so the state machine can be driven
//! by a scripted transport in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use roomwatch_api::stream::{EventStreamHandle, StreamSettings, WsConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(256);
//! let connector = WsConnector::new("http://localhost:8000".parse()?, None);
//! let handle = EventStreamHandle::spawn(connector, StreamSettings::default(), tx, &CancellationToken::new());
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{}: {event:?}", event.name());
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::push::{self, Frame, PushEvent};

/// Close code used when the peer vanishes without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

// ── Transport abstraction ────────────────────────────────────────────

/// One unit of inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame to decode.
    Text(String),
    /// Transport-level keepalive (WebSocket ping/pong). Counts as liveness.
    Heartbeat,
}

/// An established duplex connection.
pub trait Connection: Send {
    /// Next inbound item. `None` means the peer closed the stream.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Inbound, Error>>> + Send;

    /// Send a text frame.
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Opens connections to the push endpoint.
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Conn, Error>> + Send;
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Growth factor per consecutive failure. Default: 2.0.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// `delay = min(initial * multiplier^attempt, max)`
    ///
    /// No jitter: consecutive delays never shrink.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// Runtime settings for the stream client.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub reconnect: ReconnectConfig,
    /// Give up on a connection attempt (TCP, TLS and upgrade) after this long.
    pub connect_timeout: Duration,
    /// Force a reconnect after this long without any inbound traffic.
    pub idle_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(45),
        }
    }
}

// ── State machine ────────────────────────────────────────────────────

/// Observable connection state of the push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectWait { attempt: u32, delay: Duration },
    /// Terminal: set only by shutdown.
    Closed,
}

/// Pure connection lifecycle: owns the state and the failure counter.
///
/// `Disconnected → Connecting → Connected → ReconnectWait → Connecting …`,
/// with `Closed` reachable from anywhere and never left.
#[derive(Debug, Clone)]
pub struct StreamLifecycle {
    state: StreamState,
    failures: u32,
    config: ReconnectConfig,
}

impl StreamLifecycle {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            state: StreamState::Disconnected,
            failures: 0,
            config,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// Start a connection attempt.
    pub fn begin_connect(&mut self) -> &StreamState {
        if !self.is_closed() {
            self.state = StreamState::Connecting;
        }
        &self.state
    }

    /// The transport is up. Resets the backoff.
    pub fn connected(&mut self) -> &StreamState {
        if !self.is_closed() {
            self.state = StreamState::Connected;
            self.failures = 0;
        }
        &self.state
    }

    /// The attempt or the established connection failed.
    ///
    /// Returns the delay to wait before the next attempt, or `None` once closed.
    pub fn failed(&mut self) -> Option<Duration> {
        if self.is_closed() {
            return None;
        }
        let attempt = self.failures;
        let delay = self.config.delay_for(attempt);
        self.failures = self.failures.saturating_add(1);
        self.state = StreamState::ReconnectWait { attempt, delay };
        Some(delay)
    }

    pub fn close(&mut self) -> &StreamState {
        self.state = StreamState::Closed;
        &self.state
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running push stream.
///
/// Call [`shutdown`](Self::shutdown) to close the connection and stop
/// reconnecting; the state then settles on [`StreamState::Closed`].
pub struct EventStreamHandle {
    state_rx: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventStreamHandle {
    /// Spawn the reconnection loop.
    ///
    /// Returns immediately; the first connection attempt happens on the
    /// background task. `cancel` is the parent shutdown signal.
    pub fn spawn<C: Connector>(
        connector: C,
        settings: StreamSettings,
        event_tx: mpsc::Sender<PushEvent>,
        cancel: &CancellationToken,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(StreamState::Disconnected);
        let cancel = cancel.child_token();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            stream_loop(connector, settings, event_tx, state_tx, task_cancel).await;
        });

        Self {
            state_rx,
            cancel,
            task,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> StreamState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state_rx.clone()
    }

    /// Signal the background task to close the connection and stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the background task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "push stream task panicked");
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

enum ReadEnd {
    Shutdown,
    Lost(Error),
}

/// Main loop: connect → read → on loss, backoff → reconnect.
async fn stream_loop<C: Connector>(
    connector: C,
    settings: StreamSettings,
    event_tx: mpsc::Sender<PushEvent>,
    state_tx: watch::Sender<StreamState>,
    cancel: CancellationToken,
) {
    let mut lifecycle = StreamLifecycle::new(settings.reconnect.clone());

    loop {
        publish(&state_tx, lifecycle.begin_connect());

        let attempt = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = tokio::time::timeout(settings.connect_timeout, connector.connect()) => {
                result.unwrap_or_else(|_elapsed| {
                    Err(Error::WebSocketConnect(format!(
                        "no handshake within {}ms",
                        settings.connect_timeout.as_millis()
                    )))
                })
            }
        };

        match attempt {
            Ok(mut conn) => {
                publish(&state_tx, lifecycle.connected());
                info!("push stream connected");

                match read_until_lost(&mut conn, &settings, &event_tx, &cancel).await {
                    ReadEnd::Shutdown => break,
                    ReadEnd::Lost(e) => warn!(error = %e, "push stream lost"),
                }
            }
            Err(e) => warn!(error = %e, "push stream connect failed"),
        }

        let Some(delay) = lifecycle.failed() else { break };
        publish(&state_tx, lifecycle.state());
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    publish(&state_tx, lifecycle.close());
    debug!("push stream loop exiting");
}

fn publish(state_tx: &watch::Sender<StreamState>, state: &StreamState) {
    trace!(?state, "push stream state");
    state_tx.send_replace(state.clone());
}

/// Read frames until the connection drops, the idle window passes, or shutdown.
async fn read_until_lost<T: Connection>(
    conn: &mut T,
    settings: &StreamSettings,
    event_tx: &mpsc::Sender<PushEvent>,
    cancel: &CancellationToken,
) -> ReadEnd {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return ReadEnd::Shutdown,
            next = tokio::time::timeout(settings.idle_timeout, conn.recv()) => next,
        };

        let inbound = match next {
            Err(_elapsed) => {
                return ReadEnd::Lost(Error::IdleTimeout {
                    idle_secs: settings.idle_timeout.as_secs(),
                });
            }
            Ok(None) => {
                return ReadEnd::Lost(Error::WebSocketClosed {
                    code: ABNORMAL_CLOSURE,
                    reason: "stream ended".into(),
                });
            }
            Ok(Some(Err(e))) => return ReadEnd::Lost(e),
            Ok(Some(Ok(inbound))) => inbound,
        };

        let Inbound::Text(text) = inbound else {
            trace!("push stream heartbeat");
            continue;
        };

        match push::decode_frame(&text) {
            Ok(Frame::Open(open)) => {
                debug!(
                    sid = %open.sid,
                    ping_interval_ms = open.ping_interval,
                    "engine.io session opened"
                );
                if let Err(e) = conn.send(push::CONNECT_NAMESPACE.into()).await {
                    return ReadEnd::Lost(e);
                }
            }
            Ok(Frame::Ping) => {
                if let Err(e) = conn.send(push::PONG.into()).await {
                    return ReadEnd::Lost(e);
                }
            }
            Ok(Frame::Connected) => debug!("push namespace joined"),
            Ok(Frame::Pong | Frame::Ignored) => trace!("push control frame"),
            Ok(Frame::Close | Frame::Disconnected) => {
                return ReadEnd::Lost(Error::WebSocketClosed {
                    code: 1000,
                    reason: "server ended the session".into(),
                });
            }
            Ok(Frame::ConnectError(message)) => {
                return ReadEnd::Lost(Error::WebSocketConnect(message));
            }
            Ok(Frame::Event(event)) => {
                trace!(event = event.name(), "push event received");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return ReadEnd::Shutdown,
                    sent = event_tx.send(event) => {
                        if sent.is_err() {
                            debug!("event receiver dropped, stopping push stream");
                            return ReadEnd::Shutdown;
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "dropping malformed push frame"),
        }
    }
}

// ── WebSocket transport ──────────────────────────────────────────────

/// Connects to a Socket.IO endpoint over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    authorization: Option<String>,
}

impl WsConnector {
    /// `url` may be the server root (`http://host:8000`) or a full
    /// `ws://…/socket.io/?EIO=4&transport=websocket` endpoint.
    pub fn new(url: Url, authorization: Option<String>) -> Self {
        Self {
            url: socketio_endpoint(url),
            authorization,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for WsConnector {
    type Conn = WsConnection;

    async fn connect(&self) -> Result<WsConnection, Error> {
        info!(url = %self.url, "connecting to push stream");

        let uri: tungstenite::http::Uri = self
            .url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(ref auth) = self.authorization {
            request = request.with_header("Authorization", auth.clone());
        }

        let (inner, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        Ok(WsConnection { inner })
    }
}

/// A live WebSocket connection.
pub struct WsConnection {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<Inbound, Error>> {
        loop {
            match self.inner.next().await? {
                Ok(tungstenite::Message::Text(text)) => {
                    return Some(Ok(Inbound::Text(text.as_str().to_owned())));
                }
                // tungstenite answers pings itself
                Ok(tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_)) => {
                    return Some(Ok(Inbound::Heartbeat));
                }
                Ok(tungstenite::Message::Close(frame)) => {
                    let (code, reason) = frame.map_or((ABNORMAL_CLOSURE, String::new()), |cf| {
                        (u16::from(cf.code), cf.reason.as_str().to_owned())
                    });
                    return Some(Err(Error::WebSocketClosed { code, reason }));
                }
                Ok(_) => {}
                Err(e) => return Some(Err(Error::WebSocketConnect(e.to_string()))),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), Error> {
        self.inner
            .send(tungstenite::Message::Text(text.into()))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))
    }
}

/// Normalize a configured URL into a Socket.IO WebSocket endpoint.
fn socketio_endpoint(mut url: Url) -> Url {
    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        // http(s) -> ws(s) is always a valid scheme swap
        let _ = url.set_scheme(scheme);
    }

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }

    if url.query().is_none() {
        url.query_pairs_mut()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
    }
    url
}

// ── Tests ────────────────────────────────────────────────────────────
