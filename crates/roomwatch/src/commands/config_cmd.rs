//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = super::config_file(global);
    match args.command {
        ConfigCommand::Path => println!("{}", path.display()),

        ConfigCommand::Show => {
            let cfg = super::effective_config(global)?;
            let rendered = cfg
                .redacted()
                .to_toml()
                .map_err(|e| CliError::from_config(e, &path))?;
            print!("{rendered}");
        }

        ConfigCommand::Init { force } => {
            roomwatch_config::write_default(&path, force)
                .map_err(|e| CliError::from_config(e, &path))?;
            eprintln!("Wrote default config to {}", path.display());
        }
    }
    Ok(())
}
