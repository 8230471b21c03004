//! Live event stream.

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use tempest_core::{StationConfig, WeatherEvent, WeatherStation};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    config: StationConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let station = WeatherStation::start(config).await?;
    let mut rx = station.subscribe();
    let result = pump(&mut rx, &args, global).await;
    station.shutdown().await;
    result
}

async fn pump(
    rx: &mut tokio::sync::broadcast::Receiver<WeatherEvent>,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut seen = 0usize;
    if args.count == Some(0) {
        return Ok(());
    }

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                debug!("interrupted");
                return Ok(());
            }
            received = rx.recv() => match received {
                Ok(event) => {
                    let is_observation = matches!(event, WeatherEvent::Observation { .. });
                    if args.observations_only && !is_observation {
                        continue;
                    }
                    println!("{}", output::render_event(&event, global.output)?);
                    if is_observation {
                        seen += 1;
                        if args.count.is_some_and(|n| seen >= n) {
                            return Ok(());
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "output fell behind the event stream"),
                Err(RecvError::Closed) => return Err(CliError::Stopped),
            },
        }
    }
}
