//! Logging setup and in-app diagnostics for the Helm console.

pub mod logging;
pub mod tracing_layer;

pub use logging::{DEFAULT_FILTER, init_logging};
pub use tracing_layer::{DiagnosticEvent, DiagnosticLayer};
