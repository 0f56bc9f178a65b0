//! Session domain model.
//!
//! A `SessionRecord` is the client-side mirror of a backend-tracked unit of
//! agent work. The registry owns every record; views only ever see clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Coarse lifecycle class reported by the backend for a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusClass {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl StatusClass {
    /// Completed and error are terminal for a session's status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether a status event may move a session from `self` to `next`.
    ///
    /// Forward moves (including skips such as idle→completed) are legal.
    /// running→idle is legal only after an explicit stop request. Terminal
    /// classes never change.
    pub fn can_transition_to(self, next: StatusClass, stop_requested: bool) -> bool {
        use StatusClass::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Running, Idle) => stop_requested,
            (a, _) => !a.is_terminal(),
        }
    }

    /// Animation class the view attaches to a row in this status.
    pub fn view_hint(self) -> ViewHint {
        match self {
            Self::Idle => ViewHint::Static,
            Self::Running => ViewHint::Pulse,
            Self::Completed => ViewHint::Done,
            Self::Error => ViewHint::Alert,
        }
    }
}

/// Derived presentation hint recomputed on every status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ViewHint {
    #[default]
    Static,
    Pulse,
    Done,
    Alert,
}

/// Token accounting as last reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens consumed by the most recent turn
    #[serde(default)]
    pub last: u64,
    /// Tokens consumed over the whole session
    #[serde(default)]
    pub total: u64,
    /// Size of the model's context window
    #[serde(default)]
    pub context_window: u64,
}

impl TokenUsage {
    /// Fraction of the context window used by the last turn, if the window is known.
    pub fn context_fill(&self) -> Option<f64> {
        (self.context_window > 0).then(|| self.last as f64 / self.context_window as f64)
    }
}

/// Client-side record of a backend session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Backend-assigned unique session identifier
    pub id: String,
    /// Agent that runs the session (e.g. "claude-code", "codex", "meeting")
    pub agent_kind: String,
    /// Position in the session list
    pub display_ordinal: u32,
    /// Free-form status line shown under the session title
    pub status_text: String,
    pub status_class: StatusClass,
    /// Colour hint attached to the last status update
    pub color_hint: Option<String>,
    /// Animation class derived from `status_class`
    pub view_hint: ViewHint,
    /// Total cost reported so far
    pub cost_accumulated: f64,
    pub token_usage: TokenUsage,
    /// Resource the session is bound to (model id, recording id, ...)
    pub resource_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set by an explicit stop request; unlocks running→idle. Cleared by the
    /// next change of status class.
    pub stop_requested: bool,
}

impl SessionRecord {
    /// Creates an idle record for a freshly acknowledged session.
    pub fn new(id: impl Into<String>, agent_kind: impl Into<String>, display_ordinal: u32) -> Self {
        Self {
            id: id.into(),
            agent_kind: agent_kind.into(),
            display_ordinal,
            status_text: String::new(),
            status_class: StatusClass::Idle,
            color_hint: None,
            view_hint: ViewHint::Static,
            cost_accumulated: 0.0,
            token_usage: TokenUsage::default(),
            resource_ref: None,
            created_at: Utc::now(),
            stop_requested: false,
        }
    }

    /// Returns true while the backend is working on the session.
    pub fn is_running(&self) -> bool {
        self.status_class == StatusClass::Running
    }
}

/// Backend acknowledgement of a `create-session` invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAck {
    pub session_id: String,
    #[serde(default)]
    pub resource_ref: Option<String>,
}
