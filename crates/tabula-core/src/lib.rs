//! # Tabula Core
//!
//! Core types shared by every Tabula crate: the unified error taxonomy,
//! the scalar values exchanged with a database connection, argument
//! guards, and tracing subscriber setup.

pub mod error;
pub mod guard;
pub mod result;
pub mod telemetry;
pub mod value;

pub use error::*;
pub use guard::*;
pub use result::*;
pub use telemetry::TelemetryConfig;
pub use value::*;
