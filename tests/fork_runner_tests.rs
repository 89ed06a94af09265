//! Tests for the streaming-mode fork runner.
//!
//! Drives real processes (`/bin/cat`, `/usr/bin/env`, `/bin/sh`) through
//! the runner and checks byte-for-byte relay, environment injection, and
//! deadline enforcement.

#![cfg(unix)]

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Method};
use http_body_util::{BodyExt, Full};
use procgate::error::Error;
use procgate::executor::{ForkFunctionRunner, FunctionRequest, FunctionRunner};

fn invocation(
    program: &str,
    args: &[&str],
    environment: Vec<(String, String)>,
    body: &str,
) -> FunctionRequest {
    FunctionRequest {
        program: program.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        environment,
        method: Method::POST,
        uri: "/".parse().unwrap(),
        headers: HeaderMap::new(),
        body: Full::new(Bytes::from(body.to_owned()))
            .map_err(Into::into)
            .boxed_unsync(),
        content_length: Some(body.len() as u64),
    }
}

async fn collect_body(response: http::Response<procgate::executor::InvocationBody>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes()
        .to_vec()
}

// =============================================================================
// Relay
// =============================================================================

#[tokio::test]
async fn test_echo_round_trip() {
    let runner = ForkFunctionRunner::new(Duration::from_secs(10), 1024);
    let response = runner
        .run(invocation("/bin/cat", &[], Vec::new(), "hello"))
        .await
        .expect("run failed");

    assert_eq!(collect_body(response).await, b"hello");
}

#[tokio::test]
async fn test_stdout_order_is_preserved() {
    let runner = ForkFunctionRunner::new(Duration::from_secs(10), 1024);
    let response = runner
        .run(invocation(
            "/bin/sh",
            &["-c", "printf one; sleep 0.1; printf two"],
            Vec::new(),
            "",
        ))
        .await
        .expect("run failed");

    assert_eq!(collect_body(response).await, b"onetwo");
}

#[tokio::test]
async fn test_stderr_does_not_reach_response() {
    let runner = ForkFunctionRunner::new(Duration::from_secs(10), 1024);
    let response = runner
        .run(invocation(
            "/bin/sh",
            &["-c", "echo diagnostics >&2; printf out"],
            Vec::new(),
            "",
        ))
        .await
        .expect("run failed");

    assert_eq!(collect_body(response).await, b"out");
}

// =============================================================================
// Environment Injection
// =============================================================================

#[tokio::test]
async fn test_cgi_environment_reaches_function() {
    let environment = vec![
        ("Http_Method".to_string(), "GET".to_string()),
        ("Http_Query".to_string(), "bar=1".to_string()),
        ("Http_Path".to_string(), "/foo".to_string()),
        ("Http_X_Call_Id".to_string(), "abc".to_string()),
    ];

    let runner = ForkFunctionRunner::new(Duration::from_secs(10), 1024);
    let response = runner
        .run(invocation("/usr/bin/env", &[], environment, ""))
        .await
        .expect("run failed");

    let output = String::from_utf8(collect_body(response).await).expect("env output not utf-8");
    assert!(output.contains("Http_Method=GET"), "output: {output}");
    assert!(output.contains("Http_Query=bar=1"), "output: {output}");
    assert!(output.contains("Http_Path=/foo"), "output: {output}");
    assert!(output.contains("Http_X_Call_Id=abc"), "output: {output}");
}

// =============================================================================
// Deadline
// =============================================================================

#[tokio::test]
async fn test_deadline_kills_runaway_function() {
    let runner = ForkFunctionRunner::new(Duration::from_millis(200), 1024);

    let started = Instant::now();
    let response = runner
        .run(invocation("/bin/sleep", &["5"], Vec::new(), ""))
        .await
        .expect("run failed");
    let body = collect_body(response).await;
    let elapsed = started.elapsed();

    assert!(body.is_empty());
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
}

#[tokio::test]
async fn test_zero_timeout_disables_deadline() {
    let runner = ForkFunctionRunner::new(Duration::ZERO, 1024);
    let response = runner
        .run(invocation("/bin/cat", &[], Vec::new(), "still here"))
        .await
        .expect("run failed");

    assert_eq!(collect_body(response).await, b"still here");
}

// =============================================================================
// Failure Modes
// =============================================================================

#[tokio::test]
async fn test_spawn_failure_is_surfaced() {
    let runner = ForkFunctionRunner::new(Duration::from_secs(10), 1024);
    let result = runner
        .run(invocation(
            "/does/not/exist-anywhere",
            &[],
            Vec::new(),
            "",
        ))
        .await;

    match result {
        Err(Error::SpawnFailed { program, .. }) => {
            assert_eq!(program, "/does/not/exist-anywhere");
        }
        other => panic!("expected SpawnFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nonzero_exit_still_streams_output() {
    let runner = ForkFunctionRunner::new(Duration::from_secs(10), 1024);
    let response = runner
        .run(invocation(
            "/bin/sh",
            &["-c", "printf partial; exit 3"],
            Vec::new(),
            "",
        ))
        .await
        .expect("run failed");

    assert_eq!(collect_body(response).await, b"partial");
}
