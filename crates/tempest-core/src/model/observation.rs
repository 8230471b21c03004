// ── Observation normalization ──
//
// Two payload shapes feed the same view: the REST snapshot (named fields)
// and the push-channel record (positional numeric array). Both are folded
// into `DerivedMetrics`, with every field populated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

// ── Defaults ─────────────────────────────────────────────────────────

pub const DEFAULT_TEMPERATURE_C: f64 = 20.0;
pub const DEFAULT_LUX: f64 = 0.0001;
pub const DEFAULT_HUMIDITY: f64 = 50.0;
pub const DEFAULT_PRESSURE_HPA: f64 = 1013.25;
pub const DEFAULT_BATTERY_VOLTS: f64 = 3.3;

/// Bounds consumers apply to illuminance before display.
pub const MIN_LUX: f64 = 0.0001;
pub const MAX_LUX: f64 = 100_000.0;

const BATTERY_EMPTY_VOLTS: f64 = 2.4;
const BATTERY_FULL_VOLTS: f64 = 3.6;
const LOW_BATTERY_PERCENT: u8 = 20;
const LIGHTNING_MAX_DISTANCE_KM: f64 = 50.0;

const PRECIP_RAIN: u8 = 1;
const PRECIP_HAIL: u8 = 2;

// ── Stream record layout ─────────────────────────────────────────────

/// Positions within an `obs_st` record.
mod idx {
    pub const TIMESTAMP: usize = 0;
    pub const WIND_LULL: usize = 1;
    pub const WIND_AVG: usize = 2;
    pub const WIND_GUST: usize = 3;
    pub const WIND_DIRECTION: usize = 4;
    pub const PRESSURE: usize = 6;
    pub const AIR_TEMPERATURE: usize = 7;
    pub const HUMIDITY: usize = 8;
    pub const BRIGHTNESS: usize = 9;
    pub const UV: usize = 10;
    pub const SOLAR_RADIATION: usize = 11;
    pub const RAIN_ACCUMULATED: usize = 12;
    pub const PRECIPITATION_TYPE: usize = 13;
    pub const LIGHTNING_AVG_DISTANCE: usize = 14;
    pub const LIGHTNING_COUNT: usize = 15;
    pub const BATTERY_VOLTAGE: usize = 16;
}

// ── RawObservation ───────────────────────────────────────────────────

/// Named-field observation from the REST snapshot endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotRecord {
    pub timestamp: Option<i64>,
    pub air_temperature: Option<f64>,
    pub brightness: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub barometric_pressure: Option<f64>,
    pub wind_lull: Option<f64>,
    pub wind_avg: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<f64>,
    pub solar_radiation: Option<f64>,
    pub uv: Option<f64>,
}

impl SnapshotRecord {
    /// Read every known field; wrong types and nulls become `None`.
    pub fn from_object(obj: &serde_json::Map<String, Value>) -> Self {
        let num = |key: &str| obj.get(key).and_then(Value::as_f64).filter(|v| v.is_finite());
        Self {
            timestamp: obj.get("timestamp").and_then(Value::as_i64),
            air_temperature: num("air_temperature"),
            brightness: num("brightness"),
            relative_humidity: num("relative_humidity"),
            barometric_pressure: num("barometric_pressure"),
            wind_lull: num("wind_lull"),
            wind_avg: num("wind_avg"),
            wind_gust: num("wind_gust"),
            wind_direction: num("wind_direction"),
            solar_radiation: num("solar_radiation"),
            uv: num("uv"),
        }
    }
}

/// Positional observation from the push channel. `None` marks a null slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRecord(Vec<Option<f64>>);

impl StreamRecord {
    pub fn new(values: Vec<Option<f64>>) -> Self {
        Self(values)
    }

    pub fn from_values(values: &[Value]) -> Self {
        Self(
            values
                .iter()
                .map(|v| v.as_f64().filter(|f| f.is_finite()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied().flatten()
    }

    fn get_or(&self, index: usize, default: f64) -> f64 {
        self.get(index).unwrap_or(default)
    }
}

/// One observation in either wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawObservation {
    Snapshot(SnapshotRecord),
    StreamRecord(StreamRecord),
}

impl RawObservation {
    /// Discriminate a JSON payload into one of the two shapes.
    ///
    /// - object → `Snapshot`
    /// - array of numbers → `StreamRecord`
    /// - array of arrays (an `obs` field) → `StreamRecord` of the last row
    /// - anything else → empty `StreamRecord`, which normalizes to defaults
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(obj) => Self::Snapshot(SnapshotRecord::from_object(obj)),
            Value::Array(items) => {
                let row = match items.last() {
                    Some(Value::Array(last)) => last.as_slice(),
                    _ => items.as_slice(),
                };
                Self::StreamRecord(StreamRecord::from_values(row))
            }
            _ => Self::StreamRecord(StreamRecord::default()),
        }
    }

    /// Fold both shapes into one flat set of physical values.
    fn fields(&self) -> RawFields {
        match self {
            Self::Snapshot(s) => RawFields {
                timestamp: s.timestamp,
                air_temperature: s.air_temperature.unwrap_or(DEFAULT_TEMPERATURE_C),
                brightness: s.brightness.unwrap_or(DEFAULT_LUX),
                humidity: s.relative_humidity.unwrap_or(DEFAULT_HUMIDITY),
                pressure: s.barometric_pressure.unwrap_or(DEFAULT_PRESSURE_HPA),
                wind_lull: s.wind_lull.unwrap_or(0.0),
                wind_avg: s.wind_avg.unwrap_or(0.0),
                wind_gust: s.wind_gust.unwrap_or(0.0),
                wind_direction: s.wind_direction.unwrap_or(0.0),
                uv: s.uv.unwrap_or(0.0),
                solar_radiation: s.solar_radiation.unwrap_or(0.0),
                // Not part of the REST schema.
                rain_accumulated: 0.0,
                precipitation_type: 0.0,
                lightning_avg_distance: 0.0,
                lightning_count: 0.0,
                battery_voltage: DEFAULT_BATTERY_VOLTS,
            },
            Self::StreamRecord(r) => RawFields {
                timestamp: r.get(idx::TIMESTAMP).map(epoch_secs),
                air_temperature: r.get_or(idx::AIR_TEMPERATURE, DEFAULT_TEMPERATURE_C),
                brightness: r.get_or(idx::BRIGHTNESS, DEFAULT_LUX),
                humidity: r.get_or(idx::HUMIDITY, DEFAULT_HUMIDITY),
                pressure: r.get_or(idx::PRESSURE, DEFAULT_PRESSURE_HPA),
                wind_lull: r.get_or(idx::WIND_LULL, 0.0),
                wind_avg: r.get_or(idx::WIND_AVG, 0.0),
                wind_gust: r.get_or(idx::WIND_GUST, 0.0),
                wind_direction: r.get_or(idx::WIND_DIRECTION, 0.0),
                uv: r.get_or(idx::UV, 0.0),
                solar_radiation: r.get_or(idx::SOLAR_RADIATION, 0.0),
                rain_accumulated: r.get_or(idx::RAIN_ACCUMULATED, 0.0),
                precipitation_type: r.get_or(idx::PRECIPITATION_TYPE, 0.0),
                lightning_avg_distance: r.get_or(idx::LIGHTNING_AVG_DISTANCE, 0.0),
                lightning_count: r.get_or(idx::LIGHTNING_COUNT, 0.0),
                battery_voltage: r.get_or(idx::BATTERY_VOLTAGE, DEFAULT_BATTERY_VOLTS),
            },
        }
    }
}

struct RawFields {
    timestamp: Option<i64>,
    air_temperature: f64,
    brightness: f64,
    humidity: f64,
    pressure: f64,
    wind_lull: f64,
    wind_avg: f64,
    wind_gust: f64,
    wind_direction: f64,
    uv: f64,
    solar_radiation: f64,
    rain_accumulated: f64,
    precipitation_type: f64,
    lightning_avg_distance: f64,
    lightning_count: f64,
    battery_voltage: f64,
}

// ── DerivedMetrics ───────────────────────────────────────────────────

/// Normalized, source-agnostic view of one observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub observed_at: Option<DateTime<Utc>>,
    /// °C, rounded to two decimals.
    pub temperature: f64,
    /// % relative humidity.
    pub humidity: f64,
    /// Station pressure, hPa.
    pub pressure: f64,
    /// Illuminance, lux. Unclamped; see [`clamped_lux`](Self::clamped_lux).
    pub lux: f64,
    pub uv_index: f64,
    /// W/m².
    pub solar_radiation: f64,
    /// Average wind, m/s.
    pub wind_speed: f64,
    pub wind_gust: f64,
    pub wind_lull: f64,
    /// Degrees.
    pub wind_direction: f64,
    /// mm over the reporting interval.
    pub rain_accumulated: f64,
    /// 0 = none, 1 = rain, 2 = hail.
    pub precipitation_type: u8,
    /// km.
    pub lightning_avg_distance: f64,
    pub lightning_count: u32,
    pub battery_voltage: f64,
    /// 0..=100.
    pub battery_level: u8,
    pub is_raining: bool,
    pub is_hailing: bool,
    pub is_lightning_detected: bool,
    pub is_low_battery: bool,
}

impl DerivedMetrics {
    /// Illuminance within the range consumers can display.
    pub fn clamped_lux(&self) -> f64 {
        self.lux.clamp(MIN_LUX, MAX_LUX)
    }
}

impl From<&RawObservation> for DerivedMetrics {
    fn from(raw: &RawObservation) -> Self {
        normalize(raw)
    }
}

/// Normalize either payload shape. Total: bad input yields defaults.
pub fn normalize(raw: &RawObservation) -> DerivedMetrics {
    let f = raw.fields();

    let precipitation_type = to_count_u8(f.precipitation_type);
    let lightning_count = to_count(f.lightning_count);
    let battery_level = battery_level(f.battery_voltage);

    DerivedMetrics {
        observed_at: f.timestamp.and_then(|t| DateTime::from_timestamp(t, 0)),
        temperature: round2(f.air_temperature),
        humidity: f.humidity,
        pressure: f.pressure,
        lux: f.brightness,
        uv_index: f.uv,
        solar_radiation: f.solar_radiation,
        wind_speed: f.wind_avg,
        wind_gust: f.wind_gust,
        wind_lull: f.wind_lull,
        wind_direction: f.wind_direction,
        rain_accumulated: f.rain_accumulated,
        precipitation_type,
        lightning_avg_distance: f.lightning_avg_distance,
        lightning_count,
        battery_voltage: f.battery_voltage,
        battery_level,
        is_raining: precipitation_type == PRECIP_RAIN || f.rain_accumulated > 0.0,
        is_hailing: precipitation_type == PRECIP_HAIL,
        is_lightning_detected: lightning_count > 0
            && f.lightning_avg_distance > 0.0
            && f.lightning_avg_distance <= LIGHTNING_MAX_DISTANCE_KM,
        is_low_battery: battery_level < LOW_BATTERY_PERCENT,
    }
}

/// Battery percentage over the 2.4 V – 3.6 V cell range.
///
/// The sensor's nominal full-charge reading is 3.3 V; at or above it the
/// level reports full. Below it the linear scale applies unchanged, so the
/// level steps from 75 straight to 100 at 3.3 V.
pub fn battery_level(voltage: f64) -> u8 {
    if voltage >= DEFAULT_BATTERY_VOLTS {
        return 100;
    }
    let pct = ((voltage - BATTERY_EMPTY_VOLTS) / (BATTERY_FULL_VOLTS - BATTERY_EMPTY_VOLTS)
        * 100.0)
        .round();
    if pct.is_nan() { 0 } else { to_count_u8(pct.min(100.0)) }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn epoch_secs(value: f64) -> i64 {
    value as i64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn to_count(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn to_count_u8(value: f64) -> u8 {
    value.round().clamp(0.0, f64::from(u8::MAX)) as u8
}
