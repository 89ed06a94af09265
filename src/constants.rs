//! Constants for the watchdog.
//!
//! All defaults, timeouts, and tuning knobs are defined here to ensure
//! consistency and prevent magic numbers throughout the codebase.

use std::time::Duration;

// =============================================================================
// Configuration Defaults
// =============================================================================

/// Default TCP port the watchdog listens on.
pub const DEFAULT_TCP_PORT: u16 = 8080;

/// Default outer HTTP read/write timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum wall time for a single function invocation.
/// Zero disables the deadline.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// Default `Content-Type` emitted on streaming-mode responses.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default read-chunk size for the log drains (bytes).
pub const DEFAULT_LOG_BUFFER_SIZE: usize = 1024;

// =============================================================================
// HTTP Server Limits
// =============================================================================

/// Maximum request head size (1 MiB).
pub const MAX_HEADER_BYTES: usize = 1024 * 1024;

// =============================================================================
// Upstream Proxy Tuning
// =============================================================================

/// Maximum idle connections kept per upstream host.
pub const PROXY_MAX_IDLE_PER_HOST: usize = 100;

/// How long an idle pooled connection is kept alive.
pub const PROXY_POOL_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// TCP keepalive interval for upstream connections.
pub const PROXY_TCP_KEEPALIVE: Duration = Duration::from_secs(10);

// =============================================================================
// Environment Keys
// =============================================================================

/// Environment variable naming the upstream HTTP endpoint in http mode.
pub const UPSTREAM_URL_ENV: &str = "upstream_url";

// =============================================================================
// Filesystem
// =============================================================================

/// Liveness sentinel written to the temp directory on successful boot.
/// External orchestrators poll for its presence.
pub const LOCK_FILE_NAME: &str = ".lock";
