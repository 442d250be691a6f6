//! Recognised configuration options (`SPEC_FULL.md` §6.6, §10.3), following the
//! teacher's `defaults`/`TransportConfig::default()` convention of a typed config
//! struct overridable from the environment.

use std::time::Duration;

/// Per-transport-frame size ceiling used by the "default" (non-embedded) build.
pub const MAX_MSG_DEFAULT: usize = 1_048_576;
/// Per-transport-frame size ceiling used by the constrained "IPC" build (small
/// kernel message queues).
pub const MAX_MSG_IPC: usize = 2048;
/// Default scratch-buffer size for variadic serialisation.
pub const MSG_BUF_DEFAULT: usize = 2048;
/// Exit-drain poll period.
pub const SLEEP_INTERVAL_DEFAULT: Duration = Duration::from_millis(250);
/// Upper bound on how long the exit drain will busy-wait for a peer to catch
/// up, a deliberate divergence from the source's unbounded poll (`SPEC_FULL.md`
/// §9, "Drain correctness").
pub const DRAIN_TIMEOUT_DEFAULT: Duration = Duration::from_secs(5);
/// Literal EOF sentinel payload.
pub const EOF_SENTINEL: &[u8] = b"EOF!!!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugLevel {
    Silent,
    Error,
    Info,
    Debug,
}

impl DebugLevel {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "silent" | "off" => Some(DebugLevel::Silent),
            "error" => Some(DebugLevel::Error),
            "info" => Some(DebugLevel::Info),
            "debug" | "trace" => Some(DebugLevel::Debug),
            _ => None,
        }
    }

    /// A `tracing_subscriber::EnvFilter`-compatible directive string.
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            DebugLevel::Silent => "off",
            DebugLevel::Error => "error",
            DebugLevel::Info => "info",
            DebugLevel::Debug => "debug",
        }
    }
}

impl Default for DebugLevel {
    fn default() -> Self {
        DebugLevel::Info
    }
}

/// Runtime-tunable configuration, seeded with the defaults above and
/// overridable by environment variables (`Config::from_env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub max_msg_size: usize,
    pub msg_buf_size: usize,
    pub sleep_interval: Duration,
    pub drain_timeout: Duration,
    pub debug_level: DebugLevel,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_msg_size: MAX_MSG_DEFAULT,
            msg_buf_size: MSG_BUF_DEFAULT,
            sleep_interval: SLEEP_INTERVAL_DEFAULT,
            drain_timeout: DRAIN_TIMEOUT_DEFAULT,
            debug_level: DebugLevel::default(),
        }
    }
}

impl Config {
    /// Overlay environment variable overrides on top of the defaults:
    /// `POLY_COMM_MAX_MSG`, `POLY_COMM_MSG_BUF`, `POLY_COMM_SLEEP_INTERVAL_MS`,
    /// `POLY_COMM_DRAIN_TIMEOUT_MS`, `POLY_COMM_DEBUG_LEVEL`.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Ok(v) = std::env::var("POLY_COMM_MAX_MSG") {
            if let Ok(n) = v.parse() {
                cfg.max_msg_size = n;
            }
        }
        if let Ok(v) = std::env::var("POLY_COMM_MSG_BUF") {
            if let Ok(n) = v.parse() {
                cfg.msg_buf_size = n;
            }
        }
        if let Ok(v) = std::env::var("POLY_COMM_SLEEP_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                cfg.sleep_interval = Duration::from_millis(n);
            }
        }
        if let Ok(v) = std::env::var("POLY_COMM_DRAIN_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                cfg.drain_timeout = Duration::from_millis(n);
            }
        }
        if let Ok(v) = std::env::var("POLY_COMM_DEBUG_LEVEL") {
            if let Some(level) = DebugLevel::from_str(&v) {
                cfg.debug_level = level;
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.max_msg_size, MAX_MSG_DEFAULT);
        assert_eq!(cfg.msg_buf_size, 2048);
        assert_eq!(cfg.sleep_interval, Duration::from_millis(250));
    }

    #[test]
    fn debug_level_parses_known_names() {
        assert_eq!(DebugLevel::from_str("debug"), Some(DebugLevel::Debug));
        assert_eq!(DebugLevel::from_str("SILENT"), Some(DebugLevel::Silent));
        assert_eq!(DebugLevel::from_str("bogus"), None);
    }
}
