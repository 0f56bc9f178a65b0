//! Persisted per-agent preferences.

mod model;
mod repository;

pub use model::LastUsedOptions;
pub use repository::PreferenceRepository;
