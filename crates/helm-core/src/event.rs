//! Typed push events decoded once at the channel boundary.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::channel::EventName;
use crate::error::{HelmError, Result};
use crate::resource::DownloadState;
use crate::session::{MessageKind, SessionEvent, StatusClass, TokenUsage};

/// Every push event the core understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// An event addressed to one session.
    Session {
        session_id: String,
        event: SessionEvent,
    },
    DownloadProgress {
        artifact_id: String,
        downloaded_bytes: u64,
        total_bytes: u64,
    },
    DownloadStatus {
        artifact_id: String,
        state: DownloadState,
        error: Option<String>,
    },
}

impl ChannelEvent {
    /// Decodes a raw payload received on the stream called `name`.
    ///
    /// Returns `Ok(None)` for stream names the core does not know, and a
    /// `HelmError::Decode` for a known stream with a malformed payload.
    pub fn decode(name: &str, payload: Value) -> Result<Option<Self>> {
        let Ok(event_name) = name.parse::<EventName>() else {
            return Ok(None);
        };
        Self::decode_known(event_name, payload).map(Some)
    }

    /// Decodes a payload from a stream whose name is already known.
    pub fn decode_known(name: EventName, payload: Value) -> Result<Self> {
        let event = match name {
            EventName::StatusUpdate => {
                let p: StatusUpdatePayload = parse(name, payload)?;
                Self::Session {
                    session_id: p.session_id,
                    event: SessionEvent::Status {
                        text: p.text,
                        color_hint: p.color_hint,
                        state: p.state,
                    },
                }
            }
            EventName::CostUpdate => {
                let p: CostUpdatePayload = parse(name, payload)?;
                if !p.amount.is_finite() {
                    return Err(HelmError::decode(name.as_ref(), "amount is not finite"));
                }
                Self::Session {
                    session_id: p.session_id,
                    event: SessionEvent::Cost { amount: p.amount },
                }
            }
            EventName::TokenUsageUpdate => {
                let p: TokenUsagePayload = parse(name, payload)?;
                Self::Session {
                    session_id: p.session_id,
                    event: SessionEvent::TokenUsage { usage: p.usage },
                }
            }
            EventName::StreamingChunk => {
                let p: StreamingChunkPayload = parse(name, payload)?;
                Self::Session {
                    session_id: p.session_id,
                    event: SessionEvent::StreamingChunk {
                        kind: p.kind,
                        text: p.text,
                    },
                }
            }
            EventName::MessageFinal => {
                let p: MessageFinalPayload = parse(name, payload)?;
                Self::Session {
                    session_id: p.session_id,
                    event: SessionEvent::MessageFinal {
                        kind: p.kind,
                        content: p.content,
                    },
                }
            }
            EventName::DownloadProgress => {
                let p: DownloadProgressPayload = parse(name, payload)?;
                Self::DownloadProgress {
                    artifact_id: p.artifact_id,
                    downloaded_bytes: p.downloaded_bytes,
                    total_bytes: p.total_bytes,
                }
            }
            EventName::DownloadStatus => {
                let p: DownloadStatusPayload = parse(name, payload)?;
                Self::DownloadStatus {
                    artifact_id: p.artifact_id,
                    state: p.state,
                    error: p.error,
                }
            }
        };
        Ok(event)
    }
}

fn parse<T: DeserializeOwned>(name: EventName, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| HelmError::decode(name.as_ref(), e.to_string()))
}

// ============================================================================
// Wire payloads
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdatePayload {
    session_id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    color_hint: Option<String>,
    state: StatusClass,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CostUpdatePayload {
    session_id: String,
    amount: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenUsagePayload {
    session_id: String,
    usage: TokenUsage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingChunkPayload {
    session_id: String,
    #[serde(default)]
    kind: MessageKind,
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageFinalPayload {
    session_id: String,
    #[serde(default)]
    kind: MessageKind,
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadProgressPayload {
    artifact_id: String,
    downloaded_bytes: u64,
    total_bytes: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadStatusPayload {
    artifact_id: String,
    state: DownloadState,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_status_update() {
        let event = ChannelEvent::decode(
            "status-update",
            json!({
                "sessionId": "t1",
                "text": "Thinking...",
                "colorHint": "yellow",
                "state": "running"
            }),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            event,
            ChannelEvent::Session {
                session_id: "t1".into(),
                event: SessionEvent::Status {
                    text: "Thinking...".into(),
                    color_hint: Some("yellow".into()),
                    state: StatusClass::Running,
                },
            }
        );
    }

    #[test]
    fn test_unknown_stream_is_skipped() {
        let decoded = ChannelEvent::decode("telemetry-ping", json!({})).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_malformed_payload_is_a_decode_error() {
        let err = ChannelEvent::decode("cost-update", json!({ "sessionId": "t1" })).unwrap_err();
        assert!(matches!(err, HelmError::Decode { ref event, .. } if event == "cost-update"));
    }

    #[test]
    fn test_unknown_state_is_a_decode_error() {
        let err = ChannelEvent::decode(
            "status-update",
            json!({ "sessionId": "t1", "text": "?", "state": "paused" }),
        )
        .unwrap_err();
        assert!(matches!(err, HelmError::Decode { .. }));
    }

    #[test]
    fn test_decode_download_status_with_error() {
        let event = ChannelEvent::decode(
            "download-status",
            json!({ "artifactId": "base.en", "state": "error", "error": "disk full" }),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            event,
            ChannelEvent::DownloadStatus {
                artifact_id: "base.en".into(),
                state: DownloadState::Error,
                error: Some("disk full".into()),
            }
        );
    }

    #[test]
    fn test_chunk_kind_defaults_to_assistant() {
        let event = ChannelEvent::decode(
            "streaming-chunk",
            json!({ "sessionId": "t1", "text": "Hel" }),
        )
        .unwrap()
        .unwrap();
        match event {
            ChannelEvent::Session {
                event: SessionEvent::StreamingChunk { kind, .. },
                ..
            } => assert_eq!(kind, MessageKind::Assistant),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
