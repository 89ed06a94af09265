//! Mode dispatch and HTTP serving.
//!
//! At boot the [`Watchdog`] selects a runner from the configured mode and
//! binds a single handler: every method and every path routes to the
//! active runner. On successful boot an empty `.lock` sentinel is written
//! to the temp directory for external orchestrators to poll.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::cgi;
use crate::config::{OperationalMode, WatchdogConfig};
use crate::constants::{LOCK_FILE_NAME, MAX_HEADER_BYTES};
use crate::error::{Error, Result};
use crate::executor::{
    empty_body, text_body, ForkFunctionRunner, FunctionRequest, FunctionRunner,
    HttpFunctionRunner, InvocationBody,
};

// =============================================================================
// Watchdog
// =============================================================================

/// The bootstrapped sidecar: an immutable config plus the active runner.
pub struct Watchdog {
    config: WatchdogConfig,
    runner: Arc<dyn FunctionRunner>,
}

impl Watchdog {
    /// Selects and prepares the runner for the configured mode.
    ///
    /// # Errors
    ///
    /// Fails when no function command line is configured, when the mode is
    /// unrecognized, or (http mode) when the function process cannot be
    /// started.
    pub async fn new(config: WatchdogConfig) -> Result<Self> {
        if config.function_process.is_empty() {
            return Err(Error::MissingFunctionProcess);
        }

        let runner: Arc<dyn FunctionRunner> = match config.operational_mode {
            OperationalMode::Streaming => Arc::new(ForkFunctionRunner::new(
                config.exec_timeout,
                config.log_buffer_size,
            )),
            OperationalMode::Http => {
                let (program, args) = config.process();
                let runner = HttpFunctionRunner::new(
                    config.exec_timeout,
                    config.log_buffer_size,
                    program,
                    args,
                );
                runner.start().await?;
                Arc::new(runner)
            }
            OperationalMode::Invalid => {
                return Err(Error::UnknownMode(config.operational_mode.to_string()))
            }
        };

        Ok(Self { config, runner })
    }

    /// Writes the liveness sentinel, binds the configured port, and serves
    /// forever.
    pub async fn serve(self) -> Result<()> {
        let lock_path = write_lock_file()?;
        debug!(path = %lock_path.display(), "lock file written");

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.tcp_port));
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener).await
    }

    /// Serves connections from an already-bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        info!(
            port = listener.local_addr()?.port(),
            mode = %self.config.operational_mode,
            "watchdog listening"
        );

        let read_timeout = self.config.http_read_timeout;
        let watchdog = Arc::new(self);

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _peer)) => stream,
                Err(err) => {
                    error!(error = %err, "accept error");
                    continue;
                }
            };

            let watchdog = Arc::clone(&watchdog);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<Incoming>| {
                    let watchdog = Arc::clone(&watchdog);
                    async move { Ok::<_, Infallible>(watchdog.handle(req).await) }
                });

                let mut builder = http1::Builder::new();
                builder.timer(TokioTimer::new());
                builder.max_buf_size(MAX_HEADER_BYTES);
                if !read_timeout.is_zero() {
                    builder.header_read_timeout(read_timeout);
                }

                if let Err(err) = builder.serve_connection(io, service).await {
                    debug!(error = %err, "connection error");
                }
            });
        }
    }

    /// Routes one inbound request through the active runner.
    async fn handle(&self, request: Request<Incoming>) -> Response<InvocationBody> {
        let (parts, body) = request.into_parts();

        let streaming = self.config.operational_mode == OperationalMode::Streaming;
        let environment = if streaming && self.config.inject_cgi_headers {
            cgi::build_function_env(&parts.method, &parts.uri, &parts.headers)
        } else {
            Vec::new()
        };

        let content_length = parts
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let (program, args) = self.config.process();
        let invocation = FunctionRequest {
            program,
            args,
            environment,
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: body.map_err(Into::into).boxed_unsync(),
            content_length,
        };

        let mut response = match self.runner.run(invocation).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "function invocation failed");
                if streaming {
                    // Streaming mode never writes an explicit status on a
                    // runner error; the error is only logged.
                    Response::new(empty_body())
                } else {
                    let mut response = Response::new(text_body(err.to_string()));
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    response
                }
            }
        };

        if streaming {
            match HeaderValue::from_str(&self.config.content_type) {
                Ok(value) => {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                Err(_) => warn!(
                    content_type = %self.config.content_type,
                    "configured content_type is not a valid header value"
                ),
            }
        }

        response
    }
}

// =============================================================================
// Lock File
// =============================================================================

/// Writes the empty `.lock` sentinel to the temp directory, readable only
/// by its owner. External orchestrators poll for its presence as a
/// liveness signal.
pub fn write_lock_file() -> std::io::Result<PathBuf> {
    let path = std::env::temp_dir().join(LOCK_FILE_NAME);
    std::fs::write(&path, b"")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(path)
}
