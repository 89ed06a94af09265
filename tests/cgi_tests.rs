//! Tests for CGI-style environment derivation.

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use procgate::cgi::build_function_env;

fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[test]
fn test_request_metadata_variables() {
    let headers = HeaderMap::new();
    let uri: Uri = "/foo?bar=1".parse().unwrap();

    let env = build_function_env(&Method::GET, &uri, &headers);

    assert_eq!(lookup(&env, "Http_Method"), Some("GET"));
    assert_eq!(lookup(&env, "Http_Query"), Some("bar=1"));
    assert_eq!(lookup(&env, "Http_Path"), Some("/foo"));
}

#[test]
fn test_header_name_canonicalization() {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-call-id"),
        HeaderValue::from_static("abc"),
    );
    headers.insert(
        HeaderName::from_static("content-type"),
        HeaderValue::from_static("text/plain"),
    );

    let uri: Uri = "/".parse().unwrap();
    let env = build_function_env(&Method::POST, &uri, &headers);

    assert_eq!(lookup(&env, "Http_X_Call_Id"), Some("abc"));
    assert_eq!(lookup(&env, "Http_Content_Type"), Some("text/plain"));
}

#[test]
fn test_query_omitted_when_absent() {
    let headers = HeaderMap::new();
    let uri: Uri = "/foo".parse().unwrap();

    let env = build_function_env(&Method::GET, &uri, &headers);

    assert!(lookup(&env, "Http_Query").is_none());
}

#[test]
fn test_multi_valued_header_first_value_only() {
    let mut headers = HeaderMap::new();
    headers.append(
        HeaderName::from_static("x-tag"),
        HeaderValue::from_static("first"),
    );
    headers.append(
        HeaderName::from_static("x-tag"),
        HeaderValue::from_static("second"),
    );

    let uri: Uri = "/".parse().unwrap();
    let env = build_function_env(&Method::GET, &uri, &headers);

    let tags: Vec<_> = env.iter().filter(|(k, _)| k == "Http_X_Tag").collect();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].1, "first");
}

#[test]
fn test_root_path_is_emitted() {
    let headers = HeaderMap::new();
    let uri: Uri = "/".parse().unwrap();

    let env = build_function_env(&Method::GET, &uri, &headers);

    assert_eq!(lookup(&env, "Http_Path"), Some("/"));
}
