//! Rendering of core types for the terminal.

use std::fmt::Write as _;

use serde::Serialize;

use tempest_core::{DerivedMetrics, DeviceBinding, WeatherEvent};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Serialize `value` as JSON in the requested flavour.
fn json<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::JsonCompact => serde_json::to_string(value)?,
        _ => serde_json::to_string_pretty(value)?,
    })
}

pub fn render_metrics(metrics: &DerivedMetrics, format: OutputFormat) -> Result<String, CliError> {
    if format != OutputFormat::Text {
        return json(metrics, format);
    }

    let mut out = String::new();
    let observed = metrics
        .observed_at
        .map_or_else(|| "unknown".to_owned(), |t| t.to_rfc3339());
    let _ = writeln!(out, "Observed      {observed}");
    let _ = writeln!(out, "Temperature   {:.2} °C", metrics.temperature);
    let _ = writeln!(out, "Humidity      {:.0} %", metrics.humidity);
    let _ = writeln!(out, "Pressure      {:.1} hPa", metrics.pressure);
    let _ = writeln!(
        out,
        "Wind          {:.1} m/s (gust {:.1}, lull {:.1}) from {:.0}°",
        metrics.wind_speed, metrics.wind_gust, metrics.wind_lull, metrics.wind_direction
    );
    let _ = writeln!(
        out,
        "Light         {:.0} lux, UV {:.1}, {:.0} W/m²",
        metrics.clamped_lux(),
        metrics.uv_index,
        metrics.solar_radiation
    );
    let _ = writeln!(
        out,
        "Rain          {:.2} mm{}",
        metrics.rain_accumulated,
        flag(metrics.is_raining, " (raining)")
    );
    if metrics.is_hailing {
        let _ = writeln!(out, "Hail          yes");
    }
    if metrics.is_lightning_detected {
        let _ = writeln!(
            out,
            "Lightning     {} strike(s), avg {:.0} km",
            metrics.lightning_count, metrics.lightning_avg_distance
        );
    }
    let _ = write!(
        out,
        "Battery       {}% ({:.2} V){}",
        metrics.battery_level,
        metrics.battery_voltage,
        flag(metrics.is_low_battery, " LOW")
    );
    Ok(out)
}

pub fn render_binding(binding: &DeviceBinding, format: OutputFormat) -> Result<String, CliError> {
    if format != OutputFormat::Text {
        return json(binding, format);
    }
    Ok(format!(
        "station {} -> device {} (serial {})",
        binding.station,
        binding.device_id,
        binding.serial_number.as_deref().unwrap_or("unknown")
    ))
}

/// One event per line in text mode; JSON events carry a timestamp.
pub fn render_event(event: &WeatherEvent, format: OutputFormat) -> Result<String, CliError> {
    if format == OutputFormat::Text {
        let now = chrono::Local::now().format("%H:%M:%S");
        return Ok(format!("[{now}] {event}"));
    }

    #[derive(Serialize)]
    struct Stamped<'a> {
        received_at: chrono::DateTime<chrono::Utc>,
        #[serde(flatten)]
        event: &'a WeatherEvent,
    }
    json(
        &Stamped {
            received_at: chrono::Utc::now(),
            event,
        },
        format,
    )
}

fn flag(on: bool, text: &str) -> &str {
    if on { text } else { "" }
}
