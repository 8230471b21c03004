//! CLI-owned configuration: TOML file, `TEMPEST_*` environment and flag
//! overrides, translated into `tempest_core::StationConfig`.
//!
//! Core never sees these types -- it receives a pre-built `StationConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use tempest_core::{BackoffConfig, FreshnessConfig, StationConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── TOML config structs ──────────────────────────────────────────────

/// CLI-owned TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Station id, as shown in the Tempest app.
    pub station: Option<String>,

    /// Personal access token (plaintext -- prefer `token_env` or TEMPEST_TOKEN).
    pub token: Option<String>,

    /// Name of an environment variable holding the token.
    pub token_env: Option<String>,

    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    #[serde(default = "default_push_url")]
    pub push_url: String,

    /// Request and handshake timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub backoff: BackoffSection,

    #[serde(default)]
    pub freshness: FreshnessSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            station: None,
            token: None,
            token_env: None,
            rest_url: default_rest_url(),
            push_url: default_push_url(),
            timeout: default_timeout(),
            backoff: BackoffSection::default(),
            freshness: FreshnessSection::default(),
        }
    }
}

fn default_rest_url() -> String {
    tempest_api::rest::DEFAULT_REST_URL.into()
}
fn default_push_url() -> String {
    tempest_api::websocket::DEFAULT_PUSH_URL.into()
}
fn default_timeout() -> u64 {
    30
}

/// `[backoff]` table. Durations in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffSection {
    pub initial_delay: f64,
    pub growth: f64,
    pub max_delay: f64,
    pub rate_limit_floor: f64,
    pub jitter_ratio: f64,
    pub max_retries: u32,
}

impl Default for BackoffSection {
    fn default() -> Self {
        let core = BackoffConfig::default();
        Self {
            initial_delay: core.initial_delay.as_secs_f64(),
            growth: core.growth,
            max_delay: core.max_delay.as_secs_f64(),
            rate_limit_floor: core.rate_limit_floor.as_secs_f64(),
            jitter_ratio: core.jitter_ratio,
            max_retries: core.max_retries,
        }
    }
}

/// `[freshness]` table. Durations in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FreshnessSection {
    pub initial_check: f64,
    pub check_interval: f64,
    pub staleness_window: f64,
}

impl Default for FreshnessSection {
    fn default() -> Self {
        let core = FreshnessConfig::default();
        Self {
            initial_check: core.initial_check.as_secs_f64(),
            check_interval: core.check_interval.as_secs_f64(),
            staleness_window: core.staleness_window.as_secs_f64(),
        }
    }
}

// ── Config file path ─────────────────────────────────────────────────

/// Resolve the config file path: `--config` flag, else the platform config dir.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    if let Some(ref path) = global.config {
        return path.clone();
    }
    ProjectDirs::from("com", "tempest", "tempest")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("tempest.toml"))
}

// ── Config loading ───────────────────────────────────────────────────

/// Load the config from defaults, the TOML file (if present) and
/// `TEMPEST_*` env vars. Nested keys use `__`, e.g. `TEMPEST_BACKOFF__MAX_RETRIES`.
///
/// `TEMPEST_STATION` and `TEMPEST_TOKEN` are read by clap as flag values, not here.
pub fn load_config(path: &Path) -> Result<Config, CliError> {
    let env = Env::prefixed("TEMPEST_")
        .ignore(&["station", "token", "config", "output"])
        .split("__");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(env);

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Resolution ───────────────────────────────────────────────────────

/// Translate the loaded `Config` + global flags into a `StationConfig`.
///
/// This is the single boundary where CLI config types cross into core types.
pub fn resolve_station_config(
    config: &Config,
    global: &GlobalOpts,
    path: &Path,
) -> Result<StationConfig, CliError> {
    // 1. Station (flag > env > file)
    let station = global
        .station
        .clone()
        .or_else(|| config.station.clone())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CliError::NoStation {
            path: path.display().to_string(),
        })?;

    // 2. Token
    let token = resolve_token(config, global).ok_or_else(|| CliError::NoToken {
        path: path.display().to_string(),
    })?;

    let mut station_config = StationConfig::new(station, token)?;

    // 3. Endpoints
    let rest_url = global.rest_url.as_deref().unwrap_or(&config.rest_url);
    station_config.rest_url = parse_url("rest_url", rest_url)?;
    let push_url = global.push_url.as_deref().unwrap_or(&config.push_url);
    station_config.push_url = parse_url("push_url", push_url)?;

    // 4. Timing
    station_config.timeout = Duration::from_secs(global.timeout.unwrap_or(config.timeout));
    station_config.backoff = BackoffConfig {
        initial_delay: seconds("backoff.initial_delay", config.backoff.initial_delay)?,
        growth: config.backoff.growth,
        max_delay: seconds("backoff.max_delay", config.backoff.max_delay)?,
        rate_limit_floor: seconds("backoff.rate_limit_floor", config.backoff.rate_limit_floor)?,
        jitter_ratio: config.backoff.jitter_ratio,
        max_retries: config.backoff.max_retries,
    };
    station_config.freshness = FreshnessConfig {
        initial_check: seconds("freshness.initial_check", config.freshness.initial_check)?,
        check_interval: seconds("freshness.check_interval", config.freshness.check_interval)?,
        staleness_window: seconds(
            "freshness.staleness_window",
            config.freshness.staleness_window,
        )?,
    };

    station_config.validate()?;
    Ok(station_config)
}

/// Token chain: flag / TEMPEST_TOKEN, then `token_env`, then plaintext.
fn resolve_token(config: &Config, global: &GlobalOpts) -> Option<SecretString> {
    if let Some(ref token) = global.token {
        return Some(SecretString::from(token.clone()));
    }
    if let Some(ref env_name) = config.token_env {
        if let Ok(token) = std::env::var(env_name) {
            return Some(SecretString::from(token));
        }
    }
    config.token.clone().map(SecretString::from)
}

fn parse_url(field: &str, value: &str) -> Result<url::Url, CliError> {
    value.parse().map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{value}': {e}"),
    })
}

fn seconds(field: &str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: e.to_string(),
    })
}

/// Config as TOML with the token masked, for `config show`.
pub fn redacted(config: &Config) -> Result<String, CliError> {
    let mut shown = config.clone();
    if shown.token.is_some() {
        shown.token = Some("********".into());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["tempest"];
        argv.extend_from_slice(args);
        argv.push("snapshot");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn file_values_reach_station_config() {
        let file = write_config(
            r#"
            station = "98765"
            token = "from-file"
            timeout = 12

            [backoff]
            initial_delay = 2
            max_retries = 4

            [freshness]
            staleness_window = 120
            "#,
        );
        let config = load_config(file.path()).unwrap();
        let opts = global(&["--station", "98765"]);
        let resolved = resolve_station_config(&config, &opts, file.path()).unwrap();

        assert_eq!(resolved.station.as_str(), "98765");
        assert_eq!(resolved.timeout, Duration::from_secs(12));
        assert_eq!(resolved.backoff.initial_delay, Duration::from_secs(2));
        assert_eq!(resolved.backoff.max_retries, 4);
        assert_eq!(resolved.backoff.max_delay, Duration::from_secs(300));
        assert_eq!(resolved.freshness.staleness_window, Duration::from_secs(120));
        assert_eq!(resolved.freshness.check_interval, Duration::from_secs(600));
    }

    #[test]
    fn flags_override_file() {
        let file = write_config("station = \"1\"\ntoken = \"t\"\n");
        let config = load_config(file.path()).unwrap();
        let opts = global(&["--station", "2", "--rest-url", "http://127.0.0.1:9/rest"]);
        let resolved = resolve_station_config(&config, &opts, file.path()).unwrap();

        assert_eq!(resolved.station.as_str(), "2");
        assert_eq!(resolved.rest_url.as_str(), "http://127.0.0.1:9/rest");
    }

    #[test]
    fn missing_station_is_reported() {
        let config = Config {
            token: Some("t".into()),
            ..Config::default()
        };
        let mut opts = global(&[]);
        opts.station = None;
        let err = resolve_station_config(&config, &opts, Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, CliError::NoStation { .. }));
    }

    #[test]
    fn invalid_backoff_is_rejected() {
        let mut config = Config {
            station: Some("1".into()),
            token: Some("t".into()),
            ..Config::default()
        };
        config.backoff.growth = 0.5;
        let opts = global(&["--station", "1", "--token", "t"]);
        let err = resolve_station_config(&config, &opts, Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }

    #[test]
    fn redaction_hides_token() {
        let config = Config {
            token: Some("super-secret".into()),
            ..Config::default()
        };
        let shown = redacted(&config).unwrap();
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("********"));
    }
}
