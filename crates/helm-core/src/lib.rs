//! Domain layer for the Helm console.
//!
//! Models, the decoded push-event union, the backend channel seam and the
//! repository traits shared by the application and infrastructure crates.

pub mod capability;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod preference;
pub mod recording;
pub mod resource;
pub mod session;
pub mod status;

// Re-export common error type
pub use error::{HelmError, Result};
