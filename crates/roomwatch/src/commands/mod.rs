//! Command handlers.

pub mod config_cmd;
pub mod snapshot;
pub mod watch;

use std::path::PathBuf;

use roomwatch_config::Config;
use roomwatch_core::EngineConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file this invocation uses.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(roomwatch_config::config_path)
}

/// Load the config file and layer the global CLI flags on top.
pub fn effective_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    let mut cfg =
        roomwatch_config::load_config(Some(&path)).map_err(|e| CliError::from_config(e, &path))?;
    apply_overrides(&mut cfg, global);
    Ok(cfg)
}

fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref url) = global.url {
        cfg.source.base_url.clone_from(url);
    }
    if let Some(ref token) = global.token {
        cfg.source.api_token = Some(token.clone());
        cfg.source.api_token_env = None;
    }
    if global.insecure {
        cfg.source.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.source.timeout_secs = timeout;
    }
}

pub fn engine_config(cfg: &Config, global: &GlobalOpts) -> Result<EngineConfig, CliError> {
    cfg.to_engine_config()
        .map_err(|e| CliError::from_config(e, &config_file(global)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::try_parse_from([
            "roomwatch",
            "--url",
            "http://lab:9000",
            "--token",
            "abc",
            "-k",
            "--timeout",
            "4",
            "snapshot",
        ])
        .unwrap();

        let mut cfg = Config::default();
        cfg.source.api_token_env = Some("SOME_VAR".into());
        apply_overrides(&mut cfg, &cli.global);

        assert_eq!(cfg.source.base_url, "http://lab:9000");
        assert_eq!(cfg.source.api_token.as_deref(), Some("abc"));
        assert!(cfg.source.api_token_env.is_none());
        assert!(cfg.source.insecure);
        assert_eq!(cfg.source.timeout_secs, 4);
    }
}
