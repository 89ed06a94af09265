//! Streaming-mode runner: one forked process per invocation.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::executor::{
    spawn_log_drain, BoxError, DeadlineTicket, DrainLevel, DrainPolicy, FunctionRequest,
    FunctionRunner, InvocationBody,
};

/// Chunks buffered between the stdout pump and the response body.
const STDOUT_CHANNEL_CAPACITY: usize = 16;

/// Read size for the stdout pump.
const STDOUT_CHUNK_SIZE: usize = 32 * 1024;

/// Forks a fresh function process for each invocation, streaming the
/// request body to its stdin and its stdout back to the caller. Stderr is
/// drained into the log; a deadline force-kills runaway invocations.
pub struct ForkFunctionRunner {
    exec_timeout: Duration,
    log_buffer_size: usize,
}

impl ForkFunctionRunner {
    #[must_use]
    pub fn new(exec_timeout: Duration, log_buffer_size: usize) -> Self {
        Self {
            exec_timeout,
            log_buffer_size,
        }
    }
}

#[async_trait]
impl FunctionRunner for ForkFunctionRunner {
    async fn run(&self, request: FunctionRequest) -> Result<Response<InvocationBody>> {
        let started = Instant::now();

        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .envs(
                request
                    .environment
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // The child leads its own process group; the deadline kills the group.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| Error::SpawnFailed {
            program: request.program.clone(),
            source,
        })?;
        let pid = child.id().unwrap_or_default();
        debug!(program = %request.program, pid, "function process forked");

        let mut deadline = DeadlineTicket::arm(self.exec_timeout, pid);

        if let Some(stderr) = child.stderr.take() {
            spawn_log_drain(
                stderr,
                "stderr",
                self.log_buffer_size,
                DrainLevel::Info,
                DrainPolicy::ExitLoop,
            );
        }

        // Pump the request body into stdin. Dropping the handle on every
        // path closes the pipe exactly once; the child then sees EOF.
        let stdin = child.stdin.take();
        let mut body = request.body;
        tokio::spawn(async move {
            let Some(mut stdin) = stdin else { return };
            while let Some(next) = body.frame().await {
                match next {
                    Ok(frame) => {
                        if let Ok(data) = frame.into_data() {
                            if let Err(err) = stdin.write_all(&data).await {
                                debug!(error = %err, "function stdin closed early");
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "error reading request body");
                        break;
                    }
                }
            }
        });

        // Relay stdout into the response body, then reap the child. The
        // deadline is disarmed on every path once wait returns; the timer
        // fire and the natural exit race, and the loser is a no-op.
        let stdout = child.stdout.take();
        let (tx, rx) = mpsc::channel::<std::result::Result<Frame<Bytes>, BoxError>>(
            STDOUT_CHANNEL_CAPACITY,
        );
        tokio::spawn(async move {
            if let Some(mut stdout) = stdout {
                let mut buf = vec![0u8; STDOUT_CHUNK_SIZE];
                let mut receiver_gone = false;
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            if receiver_gone {
                                continue;
                            }
                            let frame = Frame::data(Bytes::copy_from_slice(&buf[..n]));
                            if tx.send(Ok(frame)).await.is_err() {
                                // Client went away. Keep draining so the
                                // child never blocks on a full pipe; it
                                // runs to completion or the deadline.
                                receiver_gone = true;
                            }
                        }
                        Err(err) => {
                            if !receiver_gone {
                                let _ = tx.send(Err(err.into())).await;
                            }
                            break;
                        }
                    }
                }
            }

            match child.wait().await {
                Ok(status) => {
                    deadline.disarm();
                    if !status.success() {
                        error!(%status, "function exited with non-zero status");
                    }
                    debug!(
                        elapsed_secs = started.elapsed().as_secs_f64(),
                        "function invocation complete"
                    );
                }
                Err(err) => {
                    deadline.disarm();
                    error!(error = %err, "error waiting for function process");
                }
            }
        });

        let body = StreamBody::new(ReceiverStream::new(rx));
        Ok(Response::new(body.boxed_unsync()))
    }
}
