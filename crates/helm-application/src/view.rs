//! View-update stream.
//!
//! The core never renders. Every change a view may care about is published as
//! a `ViewUpdate` on a broadcast bus; each open panel holds its own receiver.

use helm_core::capability::{CapabilityItem, CapabilityKey};
use helm_core::recording::RecordingSession;
use helm_core::resource::{ArtifactState, DownloadJob, ResourceArtifact};
use helm_core::session::{MessageKind, SessionRecord};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::streaming::TranscriptMessage;

/// Why a streaming placeholder disappeared without a final message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    /// Terminal status arrived and no final message followed in time
    TerminalStatus,
    /// No chunk arrived within the idle timeout
    IdleTimeout,
    /// The session was deleted
    SessionDeleted,
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSeverity {
    Info,
    Warning,
    Error,
}

/// Follow-up the view can offer next to a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeAction {
    /// Send the user to the resource manager (e.g. no model is active)
    OpenResourceManager,
    /// Offer to restart a failed download
    RetryDownload { artifact_id: String },
}

/// Short, actionable message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<NoticeAction>,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Warning,
            message: message.into(),
            action: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: NoticeSeverity::Error,
            message: message.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: NoticeAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Artifact row as shown by the resource manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactView {
    pub artifact: ResourceArtifact,
    pub state: ArtifactState,
}

/// A change the view layer should reflect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewUpdate {
    /// Session list membership or order changed
    SessionsChanged { session_ids: Vec<String> },
    /// One session record changed
    SessionUpdated { record: SessionRecord },
    /// The in-progress placeholder grew; update it in place
    PlaceholderUpdated {
        session_id: String,
        kind: MessageKind,
        text: String,
    },
    PlaceholderCleared {
        session_id: String,
        reason: ClearReason,
    },
    /// Authoritative message appended to the transcript
    MessageFinalized {
        session_id: String,
        message: TranscriptMessage,
    },
    /// The option list for the active key changed
    CapabilitiesChanged {
        key: CapabilityKey,
        items: Vec<CapabilityItem>,
    },
    /// An option became selected; `restored` is true for hydration
    OptionSelected {
        key: CapabilityKey,
        option_id: String,
        restored: bool,
    },
    ResourcesChanged { artifacts: Vec<ArtifactView> },
    DownloadProgress { job: DownloadJob },
    RecordingChanged { session: RecordingSession },
    Notice { notice: Notice },
}

/// Broadcast bus carrying `ViewUpdate`s to every subscribed view.
#[derive(Debug, Clone)]
pub struct ViewBus {
    sender: broadcast::Sender<ViewUpdate>,
}

impl ViewBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Opens a new receiver that sees every update published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewUpdate> {
        self.sender.subscribe()
    }

    /// Publishes an update. Having no subscriber is not an error.
    pub fn publish(&self, update: ViewUpdate) {
        let _ = self.sender.send(update);
    }

    pub fn notify(&self, notice: Notice) {
        tracing::debug!("[ViewBus] notice: {}", notice.message);
        self.publish(ViewUpdate::Notice { notice });
    }
}

impl Default for ViewBus {
    fn default() -> Self {
        Self::new(256)
    }
}
