use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A downloadable, locally activatable artifact (e.g. a speech model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceArtifact {
    pub id: String,
    pub label: String,
    pub size_bytes: u64,
    /// Present on disk
    #[serde(default)]
    pub downloaded: bool,
    /// Selected for use by recording sessions
    #[serde(default)]
    pub active: bool,
}

impl ResourceArtifact {
    pub fn new(id: impl Into<String>, label: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            size_bytes,
            downloaded: false,
            active: false,
        }
    }

    /// Lifecycle state of this artifact given the current download job.
    pub fn lifecycle(&self, job: Option<&DownloadJob>) -> ArtifactState {
        if let Some(job) = job.filter(|job| job.artifact_id == self.id) {
            match job.state {
                DownloadState::Downloading => return ArtifactState::Downloading,
                DownloadState::Error => return ArtifactState::Error,
                DownloadState::Cancelled if !self.downloaded => return ArtifactState::Cancelled,
                _ => {}
            }
        }
        match (self.downloaded, self.active) {
            (true, true) => ArtifactState::Active,
            (true, false) => ArtifactState::Ready,
            _ => ArtifactState::Absent,
        }
    }
}

/// State of a download job as reported on `download-status`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DownloadState {
    #[default]
    Idle,
    Downloading,
    Ready,
    Error,
    Cancelled,
}

impl DownloadState {
    /// Ready, error and cancelled end a job and free the download slot.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Error | Self::Cancelled)
    }
}

/// The single system-wide download job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadJob {
    pub artifact_id: String,
    pub state: DownloadState,
    #[serde(default)]
    pub downloaded_bytes: u64,
    #[serde(default)]
    pub total_bytes: u64,
    /// A cancel was sent; the job stays downloading until the backend confirms.
    #[serde(default)]
    pub cancel_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadJob {
    /// A freshly reserved job for `artifact_id`.
    pub fn started(artifact_id: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            state: DownloadState::Downloading,
            downloaded_bytes: 0,
            total_bytes,
            cancel_requested: false,
            error: None,
        }
    }

    /// True while this job occupies the download slot.
    pub fn is_active(&self) -> bool {
        self.state == DownloadState::Downloading
    }

    /// Completed fraction in `0.0..=1.0`; zero while the total is unknown.
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.downloaded_bytes as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// Derived per-artifact lifecycle state shown by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactState {
    Absent,
    Downloading,
    Ready,
    Active,
    Cancelled,
    Error,
}
