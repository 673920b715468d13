//! `roomwatch snapshot`: one full load, printed, then exit.

use roomwatch_core::Engine;
use tracing::debug;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::effective_config(global)?;
    let mut config = super::engine_config(&cfg, global)?;
    config.stream = None;
    config.refresh_interval = None;

    let engine = Engine::new(config)?;
    debug!(url = %engine.config().source.base_url, "loading snapshot");
    let started = engine.start().await;
    let view = engine.current();
    let age = engine.data_age();
    engine.shutdown().await;
    started?;

    println!("{}", output::render(&view, age, global.output)?);
    Ok(())
}
