//! `roomwatch watch`: print every delivered view until Ctrl-C.

use std::time::Duration;

use roomwatch_core::Engine;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::effective_config(global)?;
    let mut config = super::engine_config(&cfg, global)?;
    if args.no_stream {
        config.stream = None;
    }
    if let Some(secs) = args.interval {
        config.refresh_interval = (secs > 0).then(|| Duration::from_secs(secs));
    }

    let engine = Engine::new(config)?;
    let mut updates = engine.subscribe();
    if let Err(e) = engine.start().await {
        engine.shutdown().await;
        return Err(e.into());
    }
    info!("watching for updates, press Ctrl-C to stop");

    let mut stream_state = engine.subscribe_stream_state();
    let mut printed = 0_usize;
    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "could not listen for Ctrl-C");
                }
                break Ok(());
            }
            changed = async {
                match stream_state.as_mut() {
                    Some(rx) => rx.changed().await.is_ok(),
                    None => std::future::pending().await,
                }
            } => {
                match stream_state.as_mut() {
                    Some(rx) if changed => {
                        let state = rx.borrow_and_update().clone();
                        info!(?state, "push stream");
                    }
                    _ => stream_state = None,
                }
            }
            next = updates.recv() => {
                let Some(view) = next else { break Ok(()) };
                if let Err(e) = print_view(&view, engine.data_age(), global.output, printed) {
                    break Err(e);
                }
                printed += 1;
                if args.max_updates.is_some_and(|max| printed >= max) {
                    break Ok(());
                }
            }
        }
    };

    engine.shutdown().await;
    result
}

fn print_view(
    view: &roomwatch_core::ViewModel,
    age: Option<chrono::Duration>,
    format: OutputFormat,
    printed: usize,
) -> Result<(), CliError> {
    let rendered = output::render(view, age, format)?;
    if format == OutputFormat::Text && printed > 0 {
        println!();
    }
    println!("{rendered}");
    Ok(())
}
