//! Watchdog configuration.
//!
//! A [`WatchdogConfig`] is a pure construction from a snapshot of
//! `KEY=VALUE` strings (normally the process environment). Parsing is
//! deliberately lenient: absent keys take documented defaults, while
//! present-but-unparseable numeric and duration values yield zero. The
//! only fatal configuration condition - a missing function command line -
//! is checked at dispatch, not here.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONTENT_TYPE, DEFAULT_EXEC_TIMEOUT, DEFAULT_HTTP_TIMEOUT, DEFAULT_LOG_BUFFER_SIZE,
    DEFAULT_TCP_PORT,
};

// =============================================================================
// OperationalMode
// =============================================================================

/// How the watchdog invokes the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalMode {
    /// Unrecognized mode string; rejected at dispatch.
    Invalid,
    /// Fork one process per request; stdio is the protocol.
    Streaming,
    /// One long-lived child HTTP server; the watchdog reverse-proxies.
    Http,
}

impl OperationalMode {
    /// Parses a mode string. Unrecognized input yields [`OperationalMode::Invalid`].
    #[must_use]
    pub fn parse(mode: &str) -> Self {
        match mode {
            "streaming" => Self::Streaming,
            "http" => Self::Http,
            _ => Self::Invalid,
        }
    }

    /// Returns the canonical mode string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "unknown",
            Self::Streaming => "streaming",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for OperationalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LogLevel
// =============================================================================

/// Verbosity of the watchdog's own log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

impl LogLevel {
    /// Parses a level string (case-insensitive). Unknown values fall back
    /// to `Info` with a warning.
    #[must_use]
    pub fn parse(level: &str) -> Self {
        match level.to_lowercase().as_str() {
            "debug" => Self::Debug,
            "info" => Self::Info,
            "error" => Self::Error,
            other => {
                tracing::warn!(log_level = other, "unknown log_level - defaulting to info");
                Self::Info
            }
        }
    }

    /// Maximum `tracing` level this setting enables.
    #[must_use]
    pub fn as_level(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => f.write_str("debug"),
            Self::Info => f.write_str("info"),
            Self::Error => f.write_str("error"),
        }
    }
}

// =============================================================================
// WatchdogConfig
// =============================================================================

/// Immutable bundle of watchdog tunables. Constructed once at boot.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Listening port.
    pub tcp_port: u16,
    /// Outer HTTP server read timeout.
    pub http_read_timeout: Duration,
    /// Outer HTTP server write timeout.
    pub http_write_timeout: Duration,
    /// Maximum wall time for one invocation; zero disables the deadline.
    pub exec_timeout: Duration,
    /// Function command line; split into program and arguments on spaces.
    pub function_process: String,
    /// `Content-Type` emitted on streaming-mode responses.
    pub content_type: String,
    /// Whether `Http_*` variables are derived from the inbound request.
    pub inject_cgi_headers: bool,
    /// Selected runner.
    pub operational_mode: OperationalMode,
    /// Read-chunk size for the log drains.
    pub log_buffer_size: usize,
    /// Watchdog log verbosity.
    pub log_level: LogLevel,
}

impl WatchdogConfig {
    /// Builds a config from a snapshot of `KEY=VALUE` strings.
    ///
    /// Parsing is total: every snapshot produces a config. Entries with no
    /// `=` are logged and skipped; values are split on the first `=`.
    #[must_use]
    pub fn new(env: &[String]) -> Self {
        let env = map_env(env);

        let mut function_process = String::new();
        if let Some(val) = env.get("fprocess") {
            function_process = val.clone();
        }
        if let Some(val) = env.get("function_process") {
            function_process = val.clone();
        }

        let content_type = env
            .get("content_type")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let log_level = match env.get("log_level") {
            Some(val) => LogLevel::parse(val),
            None => LogLevel::Info,
        };

        let mut operational_mode = OperationalMode::Streaming;
        if let Some(val) = env.get("mode") {
            if !val.is_empty() {
                operational_mode = OperationalMode::parse(val);
            }
        }

        Self {
            tcp_port: get_int(&env, "port", i64::from(DEFAULT_TCP_PORT))
                .try_into()
                .unwrap_or(0),
            http_read_timeout: get_duration(&env, "read_timeout", DEFAULT_HTTP_TIMEOUT),
            http_write_timeout: get_duration(&env, "write_timeout", DEFAULT_HTTP_TIMEOUT),
            exec_timeout: get_duration(&env, "exec_timeout", DEFAULT_EXEC_TIMEOUT),
            function_process,
            content_type,
            inject_cgi_headers: true,
            operational_mode,
            log_buffer_size: get_int(&env, "buffer_size", DEFAULT_LOG_BUFFER_SIZE as i64)
                .try_into()
                .unwrap_or(0),
            log_level,
        }
    }

    /// Splits the function command line into a program and its arguments.
    #[must_use]
    pub fn process(&self) -> (String, Vec<String>) {
        let mut parts = self.function_process.split(' ');
        let program = parts.next().unwrap_or_default().to_string();
        let args = parts.map(str::to_string).collect();
        (program, args)
    }
}

// =============================================================================
// Snapshot Parsing
// =============================================================================

fn map_env(env: &[String]) -> HashMap<String, String> {
    let mut mapped = HashMap::with_capacity(env.len());

    for entry in env {
        match entry.split_once('=') {
            Some((key, value)) => {
                mapped.insert(key.to_string(), value.to_string());
            }
            None => {
                tracing::warn!(entry = %entry, "bad environment entry, skipping");
            }
        }
    }

    mapped
}

fn get_duration(env: &HashMap<String, String>, key: &str, default: Duration) -> Duration {
    match env.get(key) {
        Some(val) => parse_duration(val).unwrap_or(Duration::ZERO),
        None => default,
    }
}

fn get_int(env: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    match env.get(key) {
        Some(val) => val.parse().unwrap_or(0),
        None => default,
    }
}

/// Parses a Go-style duration string: one or more `<number><unit>` segments
/// where unit is `ns`, `us`/`µs`, `ms`, `s`, `m`, or `h`. Fractional values
/// are accepted (`1.5s`); a bare `0` is zero.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s == "0" {
        return Some(Duration::ZERO);
    }

    let mut rest = s;
    let mut total = Duration::ZERO;
    let mut matched = false;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let (unit_len, nanos_per_unit) = if rest.starts_with("ns") {
            (2, 1.0)
        } else if rest.starts_with("us") {
            (2, 1e3)
        } else if rest.starts_with("µs") {
            ("µs".len(), 1e3)
        } else if rest.starts_with("ms") {
            (2, 1e6)
        } else if rest.starts_with('s') {
            (1, 1e9)
        } else if rest.starts_with('m') {
            (1, 60.0 * 1e9)
        } else if rest.starts_with('h') {
            (1, 3600.0 * 1e9)
        } else {
            return None;
        };
        rest = &rest[unit_len..];

        total += Duration::from_nanos((value * nanos_per_unit) as u64);
        matched = true;
    }

    matched.then_some(total)
}

// =============================================================================
// Tests
// =============================================================================
