//! Command dispatch: bridges CLI args -> core calls -> output formatting.

pub mod config_cmd;
pub mod resolve;
pub mod snapshot;
pub mod watch;

use std::sync::Arc;

use tempest_api::{RestClient, TransportConfig};
use tempest_core::StationConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a station-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: StationConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Snapshot => snapshot::handle(&config, global).await,
        Command::Resolve => resolve::handle(&config, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// REST client for one-shot commands.
fn rest_client(config: &StationConfig) -> Result<Arc<RestClient>, CliError> {
    let transport = TransportConfig::default().with_timeout(config.timeout);
    let client = RestClient::new(config.rest_url.clone(), config.token.clone(), &transport)
        .map_err(tempest_core::CoreError::from)?;
    Ok(Arc::new(client))
}
