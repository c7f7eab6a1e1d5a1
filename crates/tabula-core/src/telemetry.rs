//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; binaries and tests call
//! [`init_tracing`] once to route them somewhere.

#[cfg(feature = "telemetry")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::DaoResult;
use serde::{Deserialize, Serialize};

/// Tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directives used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Include the event target (e.g. `tabula::sql`) in each line.
    #[serde(default = "default_with_target")]
    pub with_target: bool,
}

fn default_filter() -> String {
    "info,tabula=debug".to_string()
}

fn default_with_target() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
            with_target: default_with_target(),
        }
    }
}

/// Installs a global fmt subscriber for the given configuration.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
///
/// # Errors
///
/// Returns [`crate::DaoError::Configuration`] when the filter directives
/// cannot be parsed.
#[cfg(feature = "telemetry")]
pub fn init_tracing(config: &TelemetryConfig) -> DaoResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| crate::DaoError::Configuration(format!("Invalid log filter: {e}")))?,
    };

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(config.with_target))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(config.with_target))
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    }
    Ok(())
}

/// Placeholder for when the telemetry feature is disabled.
#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_config: &TelemetryConfig) -> DaoResult<()> {
    Ok(())
}
