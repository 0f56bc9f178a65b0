//! Downloadable local artifacts (speech-recognition models).

mod manager;

pub use manager::ResourceManager;
