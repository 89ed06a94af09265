//! Function invocation engine.
//!
//! A [`FunctionRunner`] turns one inbound HTTP request - described by a
//! [`FunctionRequest`] envelope - into a response by driving the function
//! process. Two implementations exist, selected once at boot:
//!
//! - [`ForkFunctionRunner`]: forks a fresh process per request and streams
//!   stdin/stdout (streaming mode).
//! - [`HttpFunctionRunner`]: supervises one long-lived child HTTP server
//!   and reverse-proxies to it (http mode).
//!
//! This module also holds the pieces both runners share: the log drains
//! that copy child pipes into the watchdog's log stream, and the deadline
//! ticket that force-kills an invocation which outlives `exec_timeout`.

mod fork;
mod http;

pub use self::fork::ForkFunctionRunner;
pub use self::http::HttpFunctionRunner;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::error;

use crate::error::Result;

/// Boxed error used across body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type flowing through the runners, both inbound and outbound.
/// Type-erased so runners can be driven without a live socket.
pub type InvocationBody = UnsyncBoxBody<Bytes, BoxError>;

/// An empty response body.
#[must_use]
pub fn empty_body() -> InvocationBody {
    Empty::new().map_err(Into::into).boxed_unsync()
}

/// A response body holding one text payload.
#[must_use]
pub fn text_body(text: impl Into<Bytes>) -> InvocationBody {
    Full::new(text.into()).map_err(Into::into).boxed_unsync()
}

// =============================================================================
// FunctionRequest
// =============================================================================

/// Everything a runner needs to execute one invocation. Created fresh per
/// request and owned by the runner until completion.
pub struct FunctionRequest {
    /// Program to invoke.
    pub program: String,
    /// Program arguments.
    pub args: Vec<String>,
    /// Extra environment variables, added to the watchdog's own environment.
    pub environment: Vec<(String, String)>,
    /// Inbound request method.
    pub method: ::http::Method,
    /// Inbound request URI.
    pub uri: ::http::Uri,
    /// Inbound request headers.
    pub headers: ::http::HeaderMap,
    /// Inbound request body.
    pub body: InvocationBody,
    /// Declared request body length, when known.
    pub content_length: Option<u64>,
}

// =============================================================================
// FunctionRunner Trait
// =============================================================================

/// Executes function invocations. Invoked concurrently from many request
/// tasks; implementations must be safe under that.
#[async_trait]
pub trait FunctionRunner: Send + Sync {
    /// Runs one invocation to a streaming response.
    ///
    /// An `Err` means no response could be produced at all (e.g. the
    /// process failed to spawn); the dispatcher maps it to a 500. Failures
    /// after the response is committed are logged, never surfaced.
    async fn run(&self, request: FunctionRequest) -> Result<::http::Response<InvocationBody>>;
}

// =============================================================================
// Log Drain
// =============================================================================

/// Level at which a drain re-emits child output.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DrainLevel {
    Info,
    Error,
}

/// What a drain does when its pipe stops yielding data.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DrainPolicy {
    /// Log read errors (not EOF) and end the drain.
    ExitLoop,
    /// Any read failure, EOF included, terminates the watchdog.
    FatalToSidecar,
}

/// Spawns a task that copies a child pipe into the log, one record per
/// non-empty read. Reads are fixed-size chunks; no line-boundary alignment
/// is attempted, so log consumers must tolerate partial lines.
pub(crate) fn spawn_log_drain<R>(
    source: R,
    stream: &'static str,
    buffer_size: usize,
    level: DrainLevel,
    policy: DrainPolicy,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut source = source;
        let mut buf = vec![0u8; buffer_size.max(1)];
        loop {
            match source.read(&mut buf).await {
                Ok(0) => match policy {
                    DrainPolicy::ExitLoop => break,
                    DrainPolicy::FatalToSidecar => {
                        error!(stream, "function pipe closed");
                        std::process::exit(1);
                    }
                },
                Ok(n) => {
                    let chunk = trim_trailing_nuls(&buf[..n]);
                    let text = String::from_utf8_lossy(chunk);
                    match level {
                        DrainLevel::Info => tracing::info!(stream, "{}", text),
                        DrainLevel::Error => tracing::error!(stream, "{}", text),
                    }
                }
                Err(err) => {
                    error!(stream, error = %err, "error reading function pipe");
                    match policy {
                        DrainPolicy::ExitLoop => break,
                        DrainPolicy::FatalToSidecar => std::process::exit(1),
                    }
                }
            }
        }
    })
}

fn trim_trailing_nuls(chunk: &[u8]) -> &[u8] {
    let end = chunk
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |pos| pos + 1);
    &chunk[..end]
}

// =============================================================================
// Deadline Ticket
// =============================================================================

/// One-shot timer armed when a function process starts. On expiry it
/// force-kills the process group and records the event; it fires at most
/// once and is disarmed on natural exit. Dropping the ticket disarms it,
/// so every exit path stops the timer exactly once.
pub(crate) struct DeadlineTicket {
    handle: Option<JoinHandle<()>>,
}

impl DeadlineTicket {
    /// Arms the deadline for the process with the given pid. A zero
    /// timeout (deadline disabled) or an unknown pid yields an inert
    /// ticket.
    pub(crate) fn arm(timeout: Duration, pid: u32) -> Self {
        if timeout.is_zero() || pid == 0 {
            return Self { handle: None };
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            error!(timeout = ?timeout, pid, "function was killed by exec_timeout");
            kill_process_group(pid);
        });

        Self {
            handle: Some(handle),
        }
    }

    /// Stops the timer. Idempotent; a fired timer is a no-op to disarm.
    pub(crate) fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for DeadlineTicket {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// SIGKILLs the whole process group. The kill failing (e.g. the child is
/// already gone) is logged, never surfaced.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let rc = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        error!(error = %err, pid, "error killing function due to exec_timeout");
    }
}

#[cfg(not(unix))]
fn kill_process_group(pid: u32) {
    error!(pid, "process-group kill is not supported on this platform");
}

// =============================================================================
// Tests
// =============================================================================
