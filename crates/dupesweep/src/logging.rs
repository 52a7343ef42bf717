//! Logging setup: one subscriber for both `tracing` events and `log`
//! records.
//!
//! The actor and its phases emit `tracing` events with spans; the db and
//! source layers use the `log` facade. [`init`] bridges the latter into
//! the former so a single filter governs everything.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives, e.g. `info` or `dupesweep=debug,rusqlite=warn`.
const LOG_ENV: &str = "DUPESWEEP_LOG";

/// Set to `json` for machine-readable output.
const LOG_FORMAT_ENV: &str = "DUPESWEEP_LOG_FORMAT";

/// Initializes the global subscriber. Defaults to `info` when
/// `DUPESWEEP_LOG` is unset or unparsable. Calling this more than once,
/// or after another subscriber was installed, is a harmless no-op.
pub fn init() {
    if tracing_log::LogTracer::init().is_err() {
        // A logger is already installed for this process.
        return;
    }

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let installed = if json {
        tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(true)),
        )
    } else {
        tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true)),
        )
    };
    if installed.is_err() {
        log::warn!("Global tracing subscriber was already set");
    }
}
