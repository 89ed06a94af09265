//! procgate - per-function invocation sidecar.
//!
//! Fronts a child program as an HTTP endpoint. Configuration comes from
//! the environment; `fprocess` (or `function_process`) names the program
//! to invoke and `mode` selects between forking per request (`streaming`)
//! and reverse-proxying to a long-lived child server (`http`).

use std::process::ExitCode;

use procgate::config::WatchdogConfig;
use procgate::server::Watchdog;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> ExitCode {
    let env: Vec<String> = std::env::vars().map(|(k, v)| format!("{k}={v}")).collect();
    let config = WatchdogConfig::new(&env);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level.as_level())
        .with_target(false)
        .with_ansi(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to set tracing subscriber");
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.operational_mode,
        "watchdog starting"
    );

    let watchdog = match Watchdog::new(config).await {
        Ok(watchdog) => watchdog,
        Err(err) => {
            error!(error = %err, "fatal boot error");
            return ExitCode::FAILURE;
        }
    };

    // serve() runs forever; returning at all means the listener failed.
    if let Err(err) = watchdog.serve().await {
        error!(error = %err, "server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
