use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::background::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use crate::background::resource::DEFAULT_RESOURCE_INTERVAL;
use crate::background::stats::DEFAULT_STATS_INTERVAL;
use crate::poller::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_STATE_DIR: &str = ".limefrog";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration loaded from environment variables.
///
/// All fields have defaults matching the service's reference cadences.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root URL.
    pub base_url: String,
    /// Directory holding the durable state file.
    pub state_dir: PathBuf,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub stats_interval: Duration,
    pub resource_interval: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            poll_interval: DEFAULT_POLL_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
            resource_interval: DEFAULT_RESOURCE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `LIMEFROG_BASE_URL`     | `http://localhost:5000` |
    /// | `LIMEFROG_STATE_DIR`    | `.limefrog`             |
    /// | `POLL_INTERVAL_MS`      | `2000`                  |
    /// | `HEARTBEAT_INTERVAL_MS` | `5000`                  |
    /// | `STATS_INTERVAL_MS`     | `3000`                  |
    /// | `RESOURCE_INTERVAL_MS`  | `5000`                  |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    ///
    /// Unparseable values are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let millis = |name: &str, default: Duration| {
            Duration::from_millis(parse_or(&lookup, name, default.as_millis() as u64))
        };

        Self {
            base_url: lookup("LIMEFROG_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            state_dir: lookup("LIMEFROG_STATE_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            poll_interval: millis("POLL_INTERVAL_MS", defaults.poll_interval),
            heartbeat_interval: millis("HEARTBEAT_INTERVAL_MS", defaults.heartbeat_interval),
            stats_interval: millis("STATS_INTERVAL_MS", defaults.stats_interval),
            resource_interval: millis("RESOURCE_INTERVAL_MS", defaults.resource_interval),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Copy + PartialOrd + Default,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        // A zero interval would spin the timers.
        Ok(value) if value > T::default() => value,
        _ => {
            tracing::warn!(var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
