//! Tracing/logging initialization for the daemon binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Build the filter directive for a crate at a given level,
/// e.g. `filter_for("dbgbridge_daemon", "debug")` -> `"dbgbridge_daemon=debug"`.
pub fn filter_for(target: &str, level: &str) -> String {
    format!("{target}={level}")
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. With `log_json` the
/// output is one JSON object per line, otherwise the human-readable format.
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| Error::Config(format!("invalid log filter {default_filter:?}: {e}")))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };
    installed.map_err(|e| Error::Config(format!("tracing already initialised: {e}")))
}
