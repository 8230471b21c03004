//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);
    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            if !path.exists() {
                eprintln!("(file does not exist yet; defaults and environment apply)");
            }
        }
        ConfigCommand::Show => {
            let cfg = config::load_config(&path)?;
            print!("{}", config::redacted(&cfg)?);
        }
    }
    Ok(())
}
