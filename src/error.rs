//! Error types for the watchdog.

/// Result type alias for watchdog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while booting or running the watchdog.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// No function command line was configured.
    #[error("provide a \"function_process\" or \"fprocess\" environmental variable for your function")]
    MissingFunctionProcess,

    /// The configured operational mode is not supported.
    #[error("unknown watchdog mode: {0}")]
    UnknownMode(String),

    /// The `upstream_url` environment variable is missing or unparseable.
    #[error("invalid upstream_url '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    // =========================================================================
    // Process Lifecycle Errors
    // =========================================================================
    /// The function process could not be spawned.
    #[error("failed to spawn function process '{program}': {source}")]
    SpawnFailed {
        program: String,
        source: std::io::Error,
    },

    // =========================================================================
    // Proxy Errors
    // =========================================================================
    /// Building the upstream HTTP client failed.
    #[error("failed to build upstream HTTP client: {0}")]
    ProxyClient(#[from] reqwest::Error),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP response construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}
