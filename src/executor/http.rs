//! Http-mode runner: one long-lived child HTTP server, reverse-proxied.

use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use http::header::HeaderName;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::{BodyDataStream, BodyExt, StreamBody};
use hyper::body::Frame;
use reqwest::{Client, Url};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, error, info};

use crate::constants::{
    PROXY_MAX_IDLE_PER_HOST, PROXY_POOL_IDLE_TIMEOUT, PROXY_TCP_KEEPALIVE, UPSTREAM_URL_ENV,
};
use crate::error::{Error, Result};
use crate::executor::{
    empty_body, spawn_log_drain, BoxError, DrainLevel, DrainPolicy, FunctionRequest,
    FunctionRunner, InvocationBody,
};

/// State established once by [`HttpFunctionRunner::start`].
struct UpstreamState {
    /// The long-lived function process. Held so it is not reaped early;
    /// its lifetime equals the watchdog's, and it is never restarted.
    _child: Child,
    /// Kept open for the child's lifetime.
    _stdin: Option<ChildStdin>,
    /// Local HTTP endpoint the child serves on.
    upstream_url: Url,
    /// Pooled client shared by all in-flight requests.
    client: Client,
}

/// Maintains one function process listening on a local URL and
/// reverse-proxies every request to it with a per-request deadline.
///
/// The child must accept concurrent connections; the watchdog does not
/// serialize requests. The state mutex guards mutations of child state
/// only (start), never a request.
pub struct HttpFunctionRunner {
    exec_timeout: Duration,
    log_buffer_size: usize,
    program: String,
    args: Vec<String>,
    state: Mutex<Option<UpstreamState>>,
}

impl HttpFunctionRunner {
    #[must_use]
    pub fn new(
        exec_timeout: Duration,
        log_buffer_size: usize,
        program: String,
        args: Vec<String>,
    ) -> Self {
        Self {
            exec_timeout,
            log_buffer_size,
            program,
            args,
            state: Mutex::new(None),
        }
    }

    /// Spawns the function process and wires up the proxy. Called once at
    /// boot; any failure here is fatal to the watchdog.
    ///
    /// Both stdout and stderr are drained into the log (the protocol
    /// channel is HTTP, so stdout is treated as diagnostics here). The
    /// drains treat any read failure as fatal.
    pub async fn start(&self) -> Result<()> {
        // Resolve the proxy side first; the child is only spawned once
        // nothing else can fail.
        let client = make_proxy_client(self.exec_timeout)?;

        let raw_url = std::env::var(UPSTREAM_URL_ENV).unwrap_or_default();
        let upstream_url = Url::parse(&raw_url).map_err(|err| Error::InvalidUpstreamUrl {
            url: raw_url.clone(),
            reason: err.to_string(),
        })?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| Error::SpawnFailed {
            program: self.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        if let Some(stderr) = child.stderr.take() {
            spawn_log_drain(
                stderr,
                "stderr",
                self.log_buffer_size,
                DrainLevel::Error,
                DrainPolicy::FatalToSidecar,
            );
        }
        if let Some(stdout) = child.stdout.take() {
            spawn_log_drain(
                stdout,
                "stdout",
                self.log_buffer_size,
                DrainLevel::Info,
                DrainPolicy::FatalToSidecar,
            );
        }

        info!(
            program = %self.program,
            pid = child.id().unwrap_or_default(),
            upstream = %upstream_url,
            "function process started"
        );

        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(UpstreamState {
            _child: child,
            _stdin: stdin,
            upstream_url,
            client,
        });

        Ok(())
    }
}

#[async_trait]
impl FunctionRunner for HttpFunctionRunner {
    async fn run(&self, request: FunctionRequest) -> Result<Response<InvocationBody>> {
        let (client, url) = {
            let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let state = guard
                .as_ref()
                .ok_or_else(|| Error::Internal("http runner used before start".to_string()))?;
            (state.client.clone(), state.upstream_url.clone())
        };

        let mut headers = HeaderMap::with_capacity(request.headers.keys_len());
        for name in request.headers.keys() {
            if is_client_managed_header(name) {
                continue;
            }
            if let Some(value) = request.headers.get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        let mut upstream = client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(BodyDataStream::new(
                request.body,
            )));
        if !self.exec_timeout.is_zero() {
            upstream = upstream.timeout(self.exec_timeout);
        }

        let started = Instant::now();
        let response = match upstream.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() && !err.is_connect() => {
                error!(
                    timeout = ?self.exec_timeout,
                    "upstream HTTP request killed due to exec_timeout"
                );
                let mut response = Response::new(empty_body());
                *response.status_mut() = StatusCode::GATEWAY_TIMEOUT;
                return Ok(response);
            }
            Err(err) => {
                error!(error = %err, "upstream HTTP request error");
                let mut response = Response::new(empty_body());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                return Ok(response);
            }
        };

        debug!(
            method = %request.method,
            uri = %request.uri,
            status = %response.status(),
            content_length = response.content_length().unwrap_or_default(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "proxied function invocation"
        );

        let mut builder = Response::builder().status(response.status());
        if let Some(downstream) = builder.headers_mut() {
            for name in response.headers().keys() {
                if let Some(value) = response.headers().get(name) {
                    downstream.insert(name.clone(), value.clone());
                }
            }
        }

        // Status and headers are committed at this point; a relay failure
        // can only be logged.
        let body = StreamBody::new(
            response
                .bytes_stream()
                .map_ok(Frame::data)
                .map_err(|err| -> BoxError {
                    error!(error = %err, "error relaying upstream response body");
                    err.into()
                }),
        );
        Ok(builder.body(body.boxed_unsync())?)
    }
}

/// Headers the upstream client derives itself: framing is recomputed from
/// the actual body, and `Host` follows the upstream URL rather than the
/// downstream caller. Copying these through would conflict.
fn is_client_managed_header(name: &HeaderName) -> bool {
    *name == http::header::CONTENT_LENGTH
        || *name == http::header::TRANSFER_ENCODING
        || *name == http::header::CONNECTION
        || *name == http::header::HOST
}

/// Builds the pooled upstream client. The dial timeout follows the
/// invocation deadline; zero leaves connects unbounded.
fn make_proxy_client(dial_timeout: Duration) -> Result<Client> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(PROXY_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(PROXY_POOL_IDLE_TIMEOUT)
        .tcp_keepalive(PROXY_TCP_KEEPALIVE);

    if !dial_timeout.is_zero() {
        builder = builder.connect_timeout(dial_timeout);
    }

    Ok(builder.build()?)
}
