//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client runs against a local
//! development backend with zero configuration. CLI flags are applied on
//! top of the result by the `parley` binary.

use std::path::PathBuf;
use std::time::Duration;

use parley_shared::constants::{
    DEFAULT_API_URL, DEFAULT_PROBE_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the REST backend, without trailing slash.
    /// Env: `PARLEY_API_URL`
    /// Default: `http://localhost:8080`
    pub api_url: String,

    /// SQLite file to open instead of the platform data directory.
    /// Env: `PARLEY_DB_PATH`
    /// Default: unset (use `Database::new`).
    pub db_path: Option<PathBuf>,

    /// Interval between two connectivity probes.
    /// Env: `PARLEY_PROBE_INTERVAL_SECS`
    /// Default: 5 seconds
    pub probe_interval: Duration,

    /// Timeout applied to every HTTP request.
    /// Env: `PARLEY_REQUEST_TIMEOUT_SECS`
    /// Default: 15 seconds
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            db_path: None,
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("PARLEY_API_URL") {
            let url = url.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                config.api_url = url.to_string();
            } else {
                tracing::warn!(value = %url, "Invalid PARLEY_API_URL, using default");
            }
        }

        if let Some(path) = lookup("PARLEY_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("PARLEY_PROBE_INTERVAL_SECS") {
            match parse_secs(&val) {
                Some(d) => config.probe_interval = d,
                None => tracing::warn!(
                    value = %val,
                    "Invalid PARLEY_PROBE_INTERVAL_SECS, using default"
                ),
            }
        }

        if let Some(val) = lookup("PARLEY_REQUEST_TIMEOUT_SECS") {
            match parse_secs(&val) {
                Some(d) => config.request_timeout = d,
                None => tracing::warn!(
                    value = %val,
                    "Invalid PARLEY_REQUEST_TIMEOUT_SECS, using default"
                ),
            }
        }

        config
    }
}

/// Positive whole seconds; zero would spin the probe loop.
fn parse_secs(val: &str) -> Option<Duration> {
    match val.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(Duration::from_secs(n)),
        _ => None,
    }
}
