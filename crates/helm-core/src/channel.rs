//! Backend event channel seam.
//!
//! The transport itself (IPC bridge, websocket, in-process loopback) lives
//! outside the core. The core only needs request/response `invoke`,
//! fire-and-forget `send`, and named push subscriptions.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tokio::sync::mpsc;

use crate::capability::CapabilityKind;
use crate::error::{HelmError, Result};

/// Raw push payloads for one named stream.
pub type EventStream = mpsc::UnboundedReceiver<Value>;

/// Names of the push streams the core subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum EventName {
    StatusUpdate,
    CostUpdate,
    TokenUsageUpdate,
    StreamingChunk,
    MessageFinal,
    DownloadProgress,
    DownloadStatus,
}

/// Commands understood by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    CreateSession {
        agent_kind: String,
        prompt: Option<String>,
    },
    StopSession {
        session_id: String,
    },
    StartRecording {
        session_id: String,
        artifact_id: String,
    },
    PauseRecording {
        session_id: String,
    },
    ResumeRecording {
        session_id: String,
    },
    StopRecording {
        session_id: String,
    },
    ListCapabilities {
        agent_id: String,
        kind: CapabilityKind,
    },
    StartDownload {
        artifact_id: String,
    },
    CancelDownload {
        artifact_id: String,
    },
    SetActive {
        artifact_id: String,
    },
    DeleteArtifact {
        artifact_id: String,
    },
    GetStatus,
}

impl BackendCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => "create-session",
            Self::StopSession { .. } => "stop-session",
            Self::StartRecording { .. } => "start-recording",
            Self::PauseRecording { .. } => "pause-recording",
            Self::ResumeRecording { .. } => "resume-recording",
            Self::StopRecording { .. } => "stop-recording",
            Self::ListCapabilities { .. } => "list-capabilities",
            Self::StartDownload { .. } => "start-download",
            Self::CancelDownload { .. } => "cancel-download",
            Self::SetActive { .. } => "set-active",
            Self::DeleteArtifact { .. } => "delete",
            Self::GetStatus => "get-status",
        }
    }

    /// Wire arguments of the command (camelCase keys).
    pub fn args(&self) -> Value {
        match self {
            Self::CreateSession { agent_kind, prompt } => {
                json!({ "agentKind": agent_kind, "prompt": prompt })
            }
            Self::StopSession { session_id }
            | Self::PauseRecording { session_id }
            | Self::ResumeRecording { session_id }
            | Self::StopRecording { session_id } => json!({ "sessionId": session_id }),
            Self::StartRecording {
                session_id,
                artifact_id,
            } => json!({ "sessionId": session_id, "artifactId": artifact_id }),
            Self::ListCapabilities { agent_id, kind } => {
                json!({ "agentId": agent_id, "kind": kind.to_string() })
            }
            Self::StartDownload { artifact_id }
            | Self::CancelDownload { artifact_id }
            | Self::SetActive { artifact_id }
            | Self::DeleteArtifact { artifact_id } => json!({ "artifactId": artifact_id }),
            Self::GetStatus => json!({}),
        }
    }
}

/// Transport used by the core to reach the backend.
#[async_trait]
pub trait BackendChannel: Send + Sync {
    /// Request/response call. A rejected call resolves to `HelmError::Transport`.
    async fn invoke(&self, command: BackendCommand) -> Result<Value>;

    /// Fire-and-forget call. Only immediate transport failures are reported.
    fn send(&self, command: BackendCommand) -> Result<()>;

    /// Opens the named push stream.
    fn subscribe(&self, event: EventName) -> Result<EventStream>;
}

/// Invokes `command` and decodes the response into `T`.
pub async fn invoke_as<T>(channel: &dyn BackendChannel, command: BackendCommand) -> Result<T>
where
    T: DeserializeOwned,
{
    let name = command.name();
    let value = channel.invoke(command).await?;
    serde_json::from_value(value).map_err(|e| HelmError::decode(name, e.to_string()))
}
