//! Infrastructure layer for the Helm console.
//!
//! Platform paths, crash-safe TOML storage, versioned DTOs and the concrete
//! repositories behind the `helm_core` traits.

pub mod config_service;
pub mod dto;
pub mod paths;
pub mod storage;
pub mod toml_preference_repository;

pub use config_service::ConfigService;
pub use paths::HelmPaths;
pub use storage::{AtomicTomlError, AtomicTomlFile};
pub use toml_preference_repository::TomlPreferenceRepository;
