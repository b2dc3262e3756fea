//! Runtime configuration shared by both transport crates.
//!
//! Loaded from environment variables with hardcoded defaults, following
//! the precedence pattern used throughout the corpus this crate's idioms
//! come from: an explicit override always wins, otherwise fall back to a
//! sane default rather than failing startup.

use std::time::Duration;

/// Default ceiling on combined queued + deferred + in-flight items
/// (admission control).
const DEFAULT_MAX_INFLIGHT: usize = 1000;
/// Default long-poll window for an operator's take call.
const DEFAULT_TAKE_POLL_SECS: u64 = 30;
/// Default window a caller's RPC may sit in `collect()` before the
/// transport layer should consider it abandoned, absent a client-provided
/// deadline.
const DEFAULT_SUBMIT_DEADLINE_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_inflight: usize,
    pub take_poll_window: Duration,
    pub submit_deadline: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_inflight: DEFAULT_MAX_INFLIGHT,
            take_poll_window: Duration::from_secs(DEFAULT_TAKE_POLL_SECS),
            submit_deadline: Duration::from_secs(DEFAULT_SUBMIT_DEADLINE_SECS),
        }
    }
}

impl Config {
    /// Build a config from environment variables, falling back to
    /// [`Config::default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_inflight: read_env_usize("BROKER_MAX_INFLIGHT", default.max_inflight),
            take_poll_window: Duration::from_secs(read_env_u64(
                "BROKER_TAKE_POLL_SECS",
                default.take_poll_window.as_secs(),
            )),
            submit_deadline: Duration::from_secs(read_env_u64(
                "BROKER_SUBMIT_DEADLINE_SECS",
                default.submit_deadline.as_secs(),
            )),
        }
    }
}

fn read_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn read_env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
