mod cli;
mod cluster;
mod config;
mod ledger;
mod model;
mod orchestrate;
mod plan;
mod rewrite;

use std::env;
use std::io;
use std::process::ExitCode;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    init_tracing();

    match cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr so stdout stays the operator-facing report.
///
/// `LEGACY_MIGRATE_LOG` takes an env-filter directive (default `warn`);
/// `LEGACY_MIGRATE_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LEGACY_MIGRATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = env::var("LEGACY_MIGRATE_LOG_JSON")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).init();
    }
}
