//! CGI-style environment derivation.
//!
//! In streaming mode the function process learns about the inbound HTTP
//! request through environment variables: every header `X-Y-Z: v` becomes
//! `Http_X_Y_Z=v`, plus `Http_Method`, `Http_Query`, and `Http_Path`.
//! Http mode never uses this - the child receives headers over HTTP
//! natively.

use http::{HeaderMap, Method, Uri};

/// Derives `Http_*` environment variables from an inbound request.
///
/// Multi-valued headers contribute their first value only. `Http_Query`
/// and `Http_Path` are emitted only when non-empty. The returned pairs are
/// meant to be ADDED to the function's inherited environment.
#[must_use]
pub fn build_function_env(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> Vec<(String, String)> {
    let mut env = Vec::with_capacity(headers.keys_len() + 3);

    for name in headers.keys() {
        let value = headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        env.push((format!("Http_{}", canonical_env_name(name.as_str())), value));
    }

    env.push(("Http_Method".to_string(), method.to_string()));

    if let Some(query) = uri.query() {
        if !query.is_empty() {
            env.push(("Http_Query".to_string(), query.to_string()));
        }
    }

    let path = uri.path();
    if !path.is_empty() {
        env.push(("Http_Path".to_string(), path.to_string()));
    }

    env
}

/// Rewrites a header name into its environment form: each dash-separated
/// segment is canonicalized (`x-call-id` -> `X-Call-Id`), then dashes
/// become underscores.
fn canonical_env_name(name: &str) -> String {
    let segments: Vec<String> = name
        .split('-')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
            }
            for c in chars {
                out.push(c.to_ascii_lowercase());
            }
            out
        })
        .collect();
    segments.join("_")
}

// =============================================================================
// Tests
// =============================================================================
