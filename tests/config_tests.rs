//! Tests for configuration parsing.
//!
//! Pins the lenient parsing behavior: absent keys take defaults,
//! present-but-unparseable numeric and duration values yield zero, and
//! malformed snapshot entries are skipped.

use std::time::Duration;

use procgate::config::{LogLevel, OperationalMode, WatchdogConfig};

fn snapshot(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn test_empty_snapshot_yields_defaults() {
    let config = WatchdogConfig::new(&[]);

    assert_eq!(config.tcp_port, 8080);
    assert_eq!(config.http_read_timeout, Duration::from_secs(10));
    assert_eq!(config.http_write_timeout, Duration::from_secs(10));
    assert_eq!(config.exec_timeout, Duration::from_secs(10));
    assert!(config.function_process.is_empty());
    assert_eq!(config.content_type, "application/octet-stream");
    assert!(config.inject_cgi_headers);
    assert_eq!(config.operational_mode, OperationalMode::Streaming);
    assert_eq!(config.log_buffer_size, 1024);
    assert_eq!(config.log_level, LogLevel::Info);
}

// =============================================================================
// Function Process
// =============================================================================

#[test]
fn test_fprocess_is_read() {
    let config = WatchdogConfig::new(&snapshot(&["fprocess=/bin/cat"]));
    assert_eq!(config.function_process, "/bin/cat");
}

#[test]
fn test_function_process_overrides_fprocess() {
    let config = WatchdogConfig::new(&snapshot(&[
        "fprocess=/bin/cat",
        "function_process=/usr/bin/env",
    ]));
    assert_eq!(config.function_process, "/usr/bin/env");
}

#[test]
fn test_process_splits_program_and_args() {
    let config = WatchdogConfig::new(&snapshot(&["fprocess=/bin/sleep 5"]));
    let (program, args) = config.process();
    assert_eq!(program, "/bin/sleep");
    assert_eq!(args, vec!["5".to_string()]);
}

#[test]
fn test_process_without_args() {
    let config = WatchdogConfig::new(&snapshot(&["fprocess=/bin/cat"]));
    let (program, args) = config.process();
    assert_eq!(program, "/bin/cat");
    assert!(args.is_empty());
}

// =============================================================================
// Numeric and Duration Leniency
// =============================================================================

#[test]
fn test_port_parses() {
    let config = WatchdogConfig::new(&snapshot(&["port=9090"]));
    assert_eq!(config.tcp_port, 9090);
}

#[test]
fn test_unparseable_port_yields_zero() {
    let config = WatchdogConfig::new(&snapshot(&["port=not-a-port"]));
    assert_eq!(config.tcp_port, 0);
}

#[test]
fn test_durations_parse() {
    let config = WatchdogConfig::new(&snapshot(&[
        "read_timeout=20s",
        "write_timeout=1m",
        "exec_timeout=200ms",
    ]));
    assert_eq!(config.http_read_timeout, Duration::from_secs(20));
    assert_eq!(config.http_write_timeout, Duration::from_secs(60));
    assert_eq!(config.exec_timeout, Duration::from_millis(200));
}

#[test]
fn test_unparseable_duration_yields_zero_not_default() {
    let config = WatchdogConfig::new(&snapshot(&["exec_timeout=forever"]));
    assert_eq!(config.exec_timeout, Duration::ZERO);
}

#[test]
fn test_zero_exec_timeout_disables_deadline() {
    let config = WatchdogConfig::new(&snapshot(&["exec_timeout=0"]));
    assert_eq!(config.exec_timeout, Duration::ZERO);
}

#[test]
fn test_buffer_size_parses() {
    let config = WatchdogConfig::new(&snapshot(&["buffer_size=256"]));
    assert_eq!(config.log_buffer_size, 256);
}

#[test]
fn test_unparseable_buffer_size_yields_zero() {
    let config = WatchdogConfig::new(&snapshot(&["buffer_size=big"]));
    assert_eq!(config.log_buffer_size, 0);
}

// =============================================================================
// Content Type
// =============================================================================

#[test]
fn test_content_type_override() {
    let config = WatchdogConfig::new(&snapshot(&["content_type=text/plain"]));
    assert_eq!(config.content_type, "text/plain");
}

// =============================================================================
// Mode
// =============================================================================

#[test]
fn test_mode_streaming() {
    let config = WatchdogConfig::new(&snapshot(&["mode=streaming"]));
    assert_eq!(config.operational_mode, OperationalMode::Streaming);
}

#[test]
fn test_mode_http() {
    let config = WatchdogConfig::new(&snapshot(&["mode=http"]));
    assert_eq!(config.operational_mode, OperationalMode::Http);
}

#[test]
fn test_unknown_mode_is_invalid() {
    let config = WatchdogConfig::new(&snapshot(&["mode=serializing"]));
    assert_eq!(config.operational_mode, OperationalMode::Invalid);
}

#[test]
fn test_empty_mode_keeps_default() {
    let config = WatchdogConfig::new(&snapshot(&["mode="]));
    assert_eq!(config.operational_mode, OperationalMode::Streaming);
}

#[test]
fn test_mode_round_trip_law() {
    for mode in ["streaming", "http"] {
        assert_eq!(OperationalMode::parse(mode).as_str(), mode);
    }
    assert_eq!(OperationalMode::parse("target-http").as_str(), "unknown");
}

// =============================================================================
// Log Level
// =============================================================================

#[test]
fn test_log_levels_parse() {
    for (raw, expected) in [
        ("debug", LogLevel::Debug),
        ("info", LogLevel::Info),
        ("error", LogLevel::Error),
        ("DEBUG", LogLevel::Debug),
    ] {
        let entry = format!("log_level={raw}");
        let config = WatchdogConfig::new(&[entry]);
        assert_eq!(config.log_level, expected, "log_level={raw}");
    }
}

#[test]
fn test_unknown_log_level_falls_back_to_info() {
    let config = WatchdogConfig::new(&snapshot(&["log_level=verbose"]));
    assert_eq!(config.log_level, LogLevel::Info);
}

// =============================================================================
// Snapshot Shape
// =============================================================================

#[test]
fn test_malformed_entry_is_skipped() {
    let config = WatchdogConfig::new(&snapshot(&["garbage", "fprocess=/bin/cat"]));
    assert_eq!(config.function_process, "/bin/cat");
}

#[test]
fn test_value_may_contain_equals() {
    let config = WatchdogConfig::new(&snapshot(&["fprocess=/bin/sh -c a=b"]));
    assert_eq!(config.function_process, "/bin/sh -c a=b");
}
