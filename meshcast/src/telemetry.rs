//! Telemetry and logging setup.
//!
//! Structured logging via `tracing`, filtered by `RUST_LOG` (defaulting to
//! `info`). Conversion requests are logged at the boundary only; mesh bytes
//! never appear in logs.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops because a global
/// subscriber is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let _ = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init();

    Ok(())
}
