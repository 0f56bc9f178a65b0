//! Response of the `get-status` poll.

use serde::{Deserialize, Serialize};

use crate::recording::RecordingStatus;
use crate::resource::{DownloadJob, ResourceArtifact};

/// Backend-side view of resources and capture, used to reattach a UI that
/// missed earlier push events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    #[serde(default)]
    pub artifacts: Vec<ResourceArtifact>,
    #[serde(default)]
    pub download: Option<DownloadJob>,
    #[serde(default)]
    pub recording: Option<RecordingStatus>,
}
