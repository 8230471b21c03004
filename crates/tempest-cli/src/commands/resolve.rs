//! Primary device lookup.

use tempest_core::{DeviceResolver, StationConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(config: &StationConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let resolver = DeviceResolver::new(super::rest_client(config)?);
    let binding = resolver.resolve(&config.station).await?;
    println!("{}", output::render_binding(&binding, global.output)?);
    Ok(())
}
