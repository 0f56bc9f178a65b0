//! Agent capability lists (models, modes, reasoning effort).

mod cache;

pub use cache::{CapabilityCache, RefreshOutcome};
