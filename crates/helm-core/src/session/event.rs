use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::model::{StatusClass, TokenUsage};

/// Kind of agent output a streamed or final message carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Assistant,
    Reasoning,
    ToolOutput,
}

/// Typed push event addressed to a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Backend status line and lifecycle class.
    Status {
        text: String,
        #[serde(default)]
        color_hint: Option<String>,
        state: StatusClass,
    },
    /// Cumulative cost reported so far.
    Cost { amount: f64 },
    /// Latest token accounting.
    TokenUsage { usage: TokenUsage },
    /// Incremental output for the in-progress message.
    StreamingChunk { kind: MessageKind, text: String },
    /// Authoritative content replacing any streamed placeholder.
    MessageFinal { kind: MessageKind, content: String },
}

impl SessionEvent {
    /// Short name used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Cost { .. } => "cost",
            Self::TokenUsage { .. } => "token_usage",
            Self::StreamingChunk { .. } => "streaming_chunk",
            Self::MessageFinal { .. } => "message_final",
        }
    }

    /// True for events handled by the streaming reconciler rather than the record.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            Self::StreamingChunk { .. } | Self::MessageFinal { .. }
        )
    }
}
