use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// State of a capture session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl RecordingState {
    /// Recording or paused: the session id is live on the backend.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }
}

/// One contiguous span of capture between a (re)start and a pause or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSegment {
    /// Elapsed seconds on the session clock when the span began
    pub started_at_elapsed: u64,
    pub duration_seconds: u64,
}

/// Observable snapshot of the recording controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Id of the current (or last stopped) session; `None` before the first start
    pub session_id: Option<String>,
    pub state: RecordingState,
    pub elapsed_seconds: u64,
    #[serde(default)]
    pub segments: Vec<RecordingSegment>,
}

/// Recording state as reported by the backend `get-status` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub session_id: String,
    pub state: RecordingState,
    pub elapsed_seconds: u64,
}
