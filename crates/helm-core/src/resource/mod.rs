//! Downloadable local resources and the download job.

mod model;

pub use model::{ArtifactState, DownloadJob, DownloadState, ResourceArtifact};
