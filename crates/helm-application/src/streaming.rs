//! Streaming reconciler.
//!
//! Turns `streaming-chunk` events into a single in-progress placeholder per
//! session and swaps it for the authoritative `message-final` content.

use chrono::{DateTime, Utc};
use helm_core::session::{MessageKind, SessionEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::view::{ClearReason, ViewBus, ViewUpdate};

/// The in-progress placeholder for one session.
///
/// Its presence in the reconciler is what makes it active; there is at most
/// one per session.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingMessage {
    pub session_id: String,
    pub kind: MessageKind,
    pub accumulated_text: String,
    pub last_chunk_at: Instant,
    /// Reconciler-wide stamp of the last appended chunk
    pub sequence: u64,
}

/// A finalised message in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    pub kind: MessageKind,
    pub content: String,
    pub finalized_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ReconcilerState {
    placeholders: HashMap<String, StreamingMessage>,
    transcripts: HashMap<String, Vec<TranscriptMessage>>,
    next_sequence: u64,
}

pub struct StreamingReconciler {
    state: RwLock<ReconcilerState>,
    bus: ViewBus,
}

impl StreamingReconciler {
    pub fn new(bus: ViewBus) -> Self {
        Self {
            state: RwLock::new(ReconcilerState::default()),
            bus,
        }
    }

    /// Routes a streaming event. Non-streaming events are ignored.
    pub async fn apply(&self, session_id: &str, event: &SessionEvent) {
        match event {
            SessionEvent::StreamingChunk { kind, text } => {
                self.on_chunk(session_id, *kind, text).await;
            }
            SessionEvent::MessageFinal { kind, content } => {
                self.on_final(session_id, *kind, content).await;
            }
            other => {
                tracing::warn!(
                    "[StreamingReconciler] Ignoring non-streaming {} event for {}",
                    other.label(),
                    session_id
                );
            }
        }
    }

    /// Appends `text` to the session's placeholder, creating it if needed.
    ///
    /// A chunk of a different kind than the active placeholder would start a
    /// second sequence and is dropped.
    pub async fn on_chunk(&self, session_id: &str, kind: MessageKind, text: &str) {
        let accumulated = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            state.next_sequence += 1;
            let sequence = state.next_sequence;
            let placeholder = state
                .placeholders
                .entry(session_id.to_string())
                .or_insert_with(|| StreamingMessage {
                    session_id: session_id.to_string(),
                    kind,
                    accumulated_text: String::new(),
                    last_chunk_at: Instant::now(),
                    sequence,
                });
            if placeholder.kind != kind {
                tracing::warn!(
                    "[StreamingReconciler] Dropping {} chunk for {}: {} sequence still active",
                    kind,
                    session_id,
                    placeholder.kind
                );
                return;
            }
            placeholder.accumulated_text.push_str(text);
            placeholder.last_chunk_at = Instant::now();
            placeholder.sequence = sequence;
            placeholder.accumulated_text.clone()
        };

        self.bus.publish(ViewUpdate::PlaceholderUpdated {
            session_id: session_id.to_string(),
            kind,
            text: accumulated,
        });
    }

    /// Replaces the placeholder with `content`, or appends it if none is active.
    pub async fn on_final(&self, session_id: &str, kind: MessageKind, content: &str) {
        let (replaced, message) = {
            let mut state = self.state.write().await;
            let replaced = state
                .placeholders
                .get(session_id)
                .is_some_and(|p| p.kind == kind);
            if replaced {
                state.placeholders.remove(session_id);
            }

            let transcript = state
                .transcripts
                .entry(session_id.to_string())
                .or_default();
            let redelivered = transcript
                .iter()
                .rev()
                .find(|m| m.kind == kind)
                .is_some_and(|m| m.content == content);
            if !replaced && redelivered {
                tracing::debug!(
                    "[StreamingReconciler] Skipping re-delivered {} final for {}",
                    kind,
                    session_id
                );
                return;
            }

            let message = TranscriptMessage {
                kind,
                content: content.to_string(),
                finalized_at: Utc::now(),
            };
            transcript.push(message.clone());
            (replaced, message)
        };

        tracing::debug!(
            "[StreamingReconciler] Finalised {} message for {} (placeholder replaced: {})",
            kind,
            session_id,
            replaced
        );
        self.bus.publish(ViewUpdate::MessageFinalized {
            session_id: session_id.to_string(),
            message,
        });
    }

    /// Removes the placeholder for `session_id` if one is still present.
    pub async fn clear(&self, session_id: &str, reason: ClearReason) -> bool {
        let removed = self
            .state
            .write()
            .await
            .placeholders
            .remove(session_id)
            .is_some();
        if removed {
            self.report_cleared(session_id, reason);
        }
        removed
    }

    /// Removes the placeholder only if no chunk was appended since `sequence`.
    pub async fn clear_if_unchanged(
        &self,
        session_id: &str,
        sequence: u64,
        reason: ClearReason,
    ) -> bool {
        let removed = {
            let mut state = self.state.write().await;
            let unchanged = state
                .placeholders
                .get(session_id)
                .is_some_and(|p| p.sequence == sequence);
            if unchanged {
                state.placeholders.remove(session_id);
            }
            unchanged
        };
        if removed {
            self.report_cleared(session_id, reason);
        }
        removed
    }

    fn report_cleared(&self, session_id: &str, reason: ClearReason) {
        tracing::warn!(
            "[StreamingReconciler] Cleared orphan placeholder for {} ({:?})",
            session_id,
            reason
        );
        self.bus.publish(ViewUpdate::PlaceholderCleared {
            session_id: session_id.to_string(),
            reason,
        });
    }

    /// Clears every placeholder that has not received a chunk within `idle_timeout`.
    pub async fn sweep_idle(&self, idle_timeout: Duration) -> Vec<String> {
        let now = Instant::now();
        let stale: Vec<String> = {
            let mut state = self.state.write().await;
            let stale: Vec<String> = state
                .placeholders
                .values()
                .filter(|p| now.saturating_duration_since(p.last_chunk_at) >= idle_timeout)
                .map(|p| p.session_id.clone())
                .collect();
            for session_id in &stale {
                state.placeholders.remove(session_id);
            }
            stale
        };

        for session_id in &stale {
            tracing::warn!(
                "[StreamingReconciler] Placeholder for {} idle for {:?}, clearing",
                session_id,
                idle_timeout
            );
            self.bus.publish(ViewUpdate::PlaceholderCleared {
                session_id: session_id.clone(),
                reason: ClearReason::IdleTimeout,
            });
        }
        stale
    }

    /// Forgets the placeholder and transcript of a deleted session.
    pub async fn remove_session(&self, session_id: &str) {
        let mut state = self.state.write().await;
        state.placeholders.remove(session_id);
        state.transcripts.remove(session_id);
    }

    pub async fn placeholder(&self, session_id: &str) -> Option<StreamingMessage> {
        self.state.read().await.placeholders.get(session_id).cloned()
    }

    pub async fn transcript(&self, session_id: &str) -> Vec<TranscriptMessage> {
        self.state
            .read()
            .await
            .transcripts
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}
