//! # procgate
//!
//! **Per-function invocation sidecar.**
//!
//! procgate is a small HTTP server that fronts an arbitrary child program
//! and exposes it as a request/response endpoint. For every inbound
//! request it either forks a fresh process and streams stdio, or
//! reverse-proxies to a long-lived child HTTP server it supervises.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                            procgate                                │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────────────────────────────────────────────┐    │
//! │  │                  FunctionRunner Trait                      │    │
//! │  │              run(request) → streaming response             │    │
//! │  └────────────────────────────────────────────────────────────┘    │
//! │                │                              │                    │
//! │  ┌─────────────▼──────────────┐  ┌────────────▼───────────────┐    │
//! │  │     ForkFunctionRunner     │  │     HttpFunctionRunner     │    │
//! │  │      (streaming mode)      │  │        (http mode)         │    │
//! │  │  fork per request          │  │  one long-lived child      │    │
//! │  │  body ↔ stdin/stdout       │  │  reverse proxy, pooled     │    │
//! │  │  stderr → log drain        │  │  stdout+stderr → log       │    │
//! │  └────────────────────────────┘  └────────────────────────────┘    │
//! │                │                              │                    │
//! │  ┌─────────────▼──────────────────────────────▼───────────────┐    │
//! │  │   DeadlineTicket: exec_timeout → SIGKILL process group     │    │
//! │  └────────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Function Contract
//!
//! **Streaming mode**: the program reads the request body from stdin,
//! writes the response body to stdout, and writes diagnostics to stderr.
//! Request metadata arrives as `Http_*` environment variables.
//!
//! **Http mode**: the program binds an HTTP server at the URL given by
//! the `upstream_url` environment variable, accepts concurrent
//! connections, and lives for the sidecar's lifetime.
//!
//! # Configuration
//!
//! Everything is configured through the environment; `fprocess` (or
//! `function_process`) is the only required key. See [`config`].
//!
//! # Example
//!
//! ```rust,ignore
//! use procgate::{config::WatchdogConfig, server::Watchdog};
//!
//! #[tokio::main]
//! async fn main() -> procgate::error::Result<()> {
//!     let env: Vec<String> = std::env::vars()
//!         .map(|(k, v)| format!("{k}={v}"))
//!         .collect();
//!     let config = WatchdogConfig::new(&env);
//!
//!     Watchdog::new(config).await?.serve().await
//! }
//! ```

// =============================================================================
// Internal Modules
// =============================================================================

mod constants;

// =============================================================================
// Public Modules
// =============================================================================

/// CGI-style env derivation from the inbound request (streaming mode).
pub mod cgi;

/// Configuration record, operational modes, log levels.
pub mod config;

/// Error and Result types.
pub mod error;

/// The invocation engine: runner trait, both runners, log drains,
/// deadline enforcement.
pub mod executor;

/// Mode dispatch, HTTP serving, liveness sentinel.
pub mod server;
