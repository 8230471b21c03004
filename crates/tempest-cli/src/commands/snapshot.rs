//! One-shot REST snapshot.

use tempest_core::{SnapshotClient, StationConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(config: &StationConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = SnapshotClient::new(super::rest_client(config)?);
    let metrics = snapshot.fetch_latest(&config.station).await?;
    println!("{}", output::render_metrics(&metrics, global.output)?);
    Ok(())
}
