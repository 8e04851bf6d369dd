use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::{info, warn};

use crate::realtime::device_monitor::HealthSource;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub bridge_url: String,

    pub health_timeout: Duration,
    pub capture_timeout: Duration,
    /// Unset means list and mutation calls wait as long as the server does.
    pub request_timeout: Option<Duration>,

    // Request deduplication
    pub dedupe_window: Duration,
    pub dedupe_capacity: u64,

    pub employee_poll: Duration,
    pub device_poll: Duration,
    pub health_source: HealthSource,

    pub session_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Missing or invalid
    /// values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("API_URL")
            .or_else(|| lookup("VITE_API_URL"))
            .unwrap_or_else(|| "http://localhost:5000/api".to_string());

        Self {
            api_url: trim_slash(api_url),
            bridge_url: trim_slash(
                lookup("BRIDGE_URL").unwrap_or_else(|| "http://localhost:3003".to_string()),
            ),
            health_timeout: Duration::from_millis(load(&lookup, "HEALTH_TIMEOUT_MS", 2_500)),
            capture_timeout: Duration::from_secs(load(&lookup, "CAPTURE_TIMEOUT_SECS", 60)),
            request_timeout: load_opt::<_, u64>(&lookup, "REQUEST_TIMEOUT_SECS").map(Duration::from_secs),
            dedupe_window: Duration::from_millis(load(&lookup, "DEDUPE_WINDOW_MS", 2_000)),
            dedupe_capacity: load(&lookup, "DEDUPE_CAPACITY", 1_000),
            employee_poll: Duration::from_secs(load::<_, u64>(&lookup, "EMPLOYEE_POLL_SECS", 30).max(1)),
            device_poll: Duration::from_secs(load::<_, u64>(&lookup, "DEVICE_POLL_SECS", 10).max(1)),
            health_source: load(&lookup, "HEALTH_SOURCE", HealthSource::Bridge),
            session_file: lookup("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".hrm-desk/session.json")),
            log_dir: lookup("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn load<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
    }
}

fn load_opt<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            info!("Ignoring {key} value {raw:?}: {e}");
            None
        }
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
