use helm_core::error::{HelmError, Result};
use helm_core::session::{SessionEvent, SessionRecord};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::pending::PendingEventBuffer;
use crate::view::{ViewBus, ViewUpdate};

/// Result of routing one event through the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The record changed; carries the updated clone.
    Applied(SessionRecord),
    /// The session is not registered yet; the event is waiting in the buffer.
    Buffered,
    /// The session is registered and the event belongs to the streaming reconciler.
    Streaming(SessionEvent),
    /// The event was rejected (illegal transition) and nothing changed.
    Ignored,
}

/// Result of registering a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// The record after any buffered event has been replayed onto it
    pub record: SessionRecord,
    /// The buffered event that was replayed, if one was waiting
    pub replayed: Option<SessionEvent>,
}

#[derive(Debug)]
struct RegistryState {
    records: HashMap<String, SessionRecord>,
    pending: PendingEventBuffer,
    next_ordinal: u32,
}

/// Single source of truth for session-derived state.
///
/// `SessionRegistry` is responsible for:
/// - Registering acknowledged sessions and replaying their buffered event
/// - Applying status, cost and token events to registered records
/// - Buffering events for ids that are not registered yet
/// - Publishing a view update for every mutation
///
/// Records and the pending buffer share one lock, so an event can never slip
/// between a registration and the replay of that session's buffered event.
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
    bus: ViewBus,
}

impl SessionRegistry {
    /// Creates an empty registry whose orphan events expire after `pending_ttl`.
    pub fn new(pending_ttl: Duration, bus: ViewBus) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                records: HashMap::new(),
                pending: PendingEventBuffer::new(pending_ttl),
                next_ordinal: 0,
            }),
            bus,
        }
    }

    /// Reserves the next display ordinal.
    pub async fn next_ordinal(&self) -> u32 {
        let mut state = self.state.write().await;
        let ordinal = state.next_ordinal;
        state.next_ordinal += 1;
        ordinal
    }

    /// Inserts `record` and replays any buffered event for its id.
    ///
    /// # Errors
    ///
    /// Returns `HelmError::AlreadyRegistered` if the id is already present; the
    /// existing record is left untouched.
    pub async fn register(&self, mut record: SessionRecord) -> Result<Registration> {
        let (registration, ids) = {
            let mut state = self.state.write().await;
            if state.records.contains_key(&record.id) {
                return Err(HelmError::AlreadyRegistered(record.id));
            }
            state.next_ordinal = state.next_ordinal.max(record.display_ordinal + 1);

            let replayed = state.pending.claim(&record.id);
            if let Some(event) = replayed.as_ref().filter(|e| !e.is_streaming()) {
                tracing::debug!(
                    "[SessionRegistry] Replaying buffered {} event for {}",
                    event.label(),
                    record.id
                );
                apply_to_record(&mut record, event);
            }

            state.records.insert(record.id.clone(), record.clone());
            (Registration { record, replayed }, sorted_ids(&state.records))
        };

        tracing::info!(
            "[SessionRegistry] Registered session {} ({})",
            registration.record.id,
            registration.record.agent_kind
        );
        self.bus.publish(ViewUpdate::SessionsChanged { session_ids: ids });
        self.bus.publish(ViewUpdate::SessionUpdated {
            record: registration.record.clone(),
        });
        Ok(registration)
    }

    /// Routes `event` for `session_id`.
    ///
    /// Never fails: unknown sessions buffer, illegal transitions are ignored
    /// with a warning.
    pub async fn apply(&self, session_id: &str, event: SessionEvent) -> ApplyOutcome {
        let outcome = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let Some(record) = state.records.get_mut(session_id) else {
                state.pending.hold(session_id, event);
                return ApplyOutcome::Buffered;
            };
            if event.is_streaming() {
                return ApplyOutcome::Streaming(event);
            }
            if apply_to_record(record, &event) {
                ApplyOutcome::Applied(record.clone())
            } else {
                ApplyOutcome::Ignored
            }
        };

        if let ApplyOutcome::Applied(record) = &outcome {
            self.bus.publish(ViewUpdate::SessionUpdated {
                record: record.clone(),
            });
        }
        outcome
    }

    /// Flags `session_id` as explicitly stopped, unlocking running→idle.
    pub async fn mark_stop_requested(&self, session_id: &str) -> Result<SessionRecord> {
        let record = {
            let mut state = self.state.write().await;
            let record = state
                .records
                .get_mut(session_id)
                .ok_or_else(|| HelmError::not_found("session", session_id))?;
            record.stop_requested = true;
            record.clone()
        };
        self.bus.publish(ViewUpdate::SessionUpdated {
            record: record.clone(),
        });
        Ok(record)
    }

    /// Removes a session and any event still buffered for it.
    pub async fn remove(&self, session_id: &str) -> Option<SessionRecord> {
        let (removed, ids) = {
            let mut state = self.state.write().await;
            state.pending.discard(session_id);
            let removed = state.records.remove(session_id);
            (removed, sorted_ids(&state.records))
        };
        if removed.is_some() {
            tracing::info!("[SessionRegistry] Removed session {}", session_id);
            self.bus
                .publish(ViewUpdate::SessionsChanged { session_ids: ids });
        }
        removed
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.state.read().await.records.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.state.read().await.records.contains_key(session_id)
    }

    /// All records ordered by display ordinal.
    pub async fn list(&self) -> Vec<SessionRecord> {
        let state = self.state.read().await;
        let mut records: Vec<SessionRecord> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.display_ordinal);
        records
    }

    /// Purges expired orphan events and returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        self.state.write().await.pending.sweep().len()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.read().await.pending.len()
    }
}

fn sorted_ids(records: &HashMap<String, SessionRecord>) -> Vec<String> {
    let mut entries: Vec<(&u32, &String)> = records
        .values()
        .map(|r| (&r.display_ordinal, &r.id))
        .collect();
    entries.sort();
    entries.into_iter().map(|(_, id)| id.clone()).collect()
}

/// Applies a non-streaming event to `record`. Returns true if anything changed.
fn apply_to_record(record: &mut SessionRecord, event: &SessionEvent) -> bool {
    match event {
        SessionEvent::Status {
            text,
            color_hint,
            state,
        } => {
            if !record
                .status_class
                .can_transition_to(*state, record.stop_requested)
            {
                tracing::warn!(
                    "[SessionRegistry] Ignoring illegal transition {} -> {} for session {}",
                    record.status_class,
                    state,
                    record.id
                );
                return false;
            }
            // A stop request covers one run only.
            if record.status_class != *state {
                record.stop_requested = false;
            }
            record.status_text = text.clone();
            record.color_hint = color_hint.clone();
            record.status_class = *state;
            record.view_hint = state.view_hint();
            true
        }
        SessionEvent::Cost { amount } => {
            record.cost_accumulated = *amount;
            true
        }
        SessionEvent::TokenUsage { usage } => {
            record.token_usage = *usage;
            true
        }
        SessionEvent::StreamingChunk { .. } | SessionEvent::MessageFinal { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_core::session::{MessageKind, StatusClass, TokenUsage, ViewHint};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Duration::from_secs(30), ViewBus::new(16))
    }

    fn status(text: &str, state: StatusClass) -> SessionEvent {
        SessionEvent::Status {
            text: text.to_string(),
            color_hint: None,
            state,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_before_registration_is_replayed() {
        let registry = registry();
        let outcome = registry
            .apply("t1", status("Thinking...", StatusClass::Running))
            .await;
        assert_eq!(outcome, ApplyOutcome::Buffered);

        let registration = registry
            .register(SessionRecord::new("t1", "codex", 0))
            .await
            .unwrap();

        assert_eq!(registration.record.status_text, "Thinking...");
        assert_eq!(registration.record.status_class, StatusClass::Running);
        assert_eq!(registration.record.view_hint, ViewHint::Pulse);
        assert_eq!(registry.pending_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_matches_direct_application() {
        let events = [
            SessionEvent::Cost { amount: 0.42 },
            status("Done", StatusClass::Completed),
            SessionEvent::TokenUsage {
                usage: TokenUsage {
                    last: 10,
                    total: 20,
                    context_window: 100,
                },
            },
        ];

        for event in events {
            let buffered = registry();
            buffered.apply("t1", event.clone()).await;
            let replayed = buffered
                .register(SessionRecord::new("t1", "codex", 0))
                .await
                .unwrap()
                .record;

            let direct = registry();
            let mut expected = direct
                .register(SessionRecord::new("t1", "codex", 0))
                .await
                .unwrap()
                .record;
            if let ApplyOutcome::Applied(record) = direct.apply("t1", event).await {
                expected = record;
            }

            assert_eq!(replayed.status_class, expected.status_class);
            assert_eq!(replayed.status_text, expected.status_text);
            assert_eq!(replayed.cost_accumulated, expected.cost_accumulated);
            assert_eq!(replayed.token_usage, expected.token_usage);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_event_has_no_effect() {
        let registry = registry();
        registry
            .apply("t1", status("Thinking...", StatusClass::Running))
            .await;
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(registry.sweep().await, 1);

        let record = registry
            .register(SessionRecord::new("t1", "codex", 0))
            .await
            .unwrap()
            .record;
        assert_eq!(record.status_class, StatusClass::Idle);
        assert!(record.status_text.is_empty());
    }

    #[tokio::test]
    async fn test_running_to_idle_needs_stop_request() {
        let registry = registry();
        registry
            .register(SessionRecord::new("t1", "codex", 0))
            .await
            .unwrap();
        registry
            .apply("t1", status("Working", StatusClass::Running))
            .await;

        let outcome = registry.apply("t1", status("Idle", StatusClass::Idle)).await;
        assert_eq!(outcome, ApplyOutcome::Ignored);

        registry.mark_stop_requested("t1").await.unwrap();
        let outcome = registry.apply("t1", status("Idle", StatusClass::Idle)).await;
        assert!(matches!(outcome, ApplyOutcome::Applied(r) if r.status_class == StatusClass::Idle));
    }

    #[tokio::test]
    async fn test_stop_request_is_consumed_by_the_stop() {
        let registry = registry();
        registry
            .register(SessionRecord::new("t1", "codex", 0))
            .await
            .unwrap();
        registry
            .apply("t1", status("Working", StatusClass::Running))
            .await;
        registry.mark_stop_requested("t1").await.unwrap();
        registry
            .apply("t1", status("Still working", StatusClass::Running))
            .await;
        assert!(registry.get("t1").await.unwrap().stop_requested);

        registry.apply("t1", status("Stopped", StatusClass::Idle)).await;
        assert!(!registry.get("t1").await.unwrap().stop_requested);

        registry
            .apply("t1", status("Next turn", StatusClass::Running))
            .await;
        let outcome = registry.apply("t1", status("Idle", StatusClass::Idle)).await;
        assert_eq!(outcome, ApplyOutcome::Ignored);
        assert_eq!(
            registry.get("t1").await.unwrap().status_class,
            StatusClass::Running
        );
    }

    #[tokio::test]
    async fn test_cost_is_cumulative_total() {
        let registry = registry();
        registry
            .register(SessionRecord::new("t1", "codex", 0))
            .await
            .unwrap();
        registry.apply("t1", SessionEvent::Cost { amount: 0.10 }).await;
        registry.apply("t1", SessionEvent::Cost { amount: 0.25 }).await;

        let record = registry.get("t1").await.unwrap();
        assert_eq!(record.cost_accumulated, 0.25);
    }

    #[tokio::test]
    async fn test_streaming_events_are_handed_back() {
        let registry = registry();
        registry
            .register(SessionRecord::new("t1", "codex", 0))
            .await
            .unwrap();
        let chunk = SessionEvent::StreamingChunk {
            kind: MessageKind::Assistant,
            text: "Hel".into(),
        };
        assert_eq!(
            registry.apply("t1", chunk.clone()).await,
            ApplyOutcome::Streaming(chunk)
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let registry = registry();
        registry
            .register(SessionRecord::new("t1", "codex", 0))
            .await
            .unwrap();
        registry
            .apply("t1", status("Working", StatusClass::Running))
            .await;

        let err = registry
            .register(SessionRecord::new("t1", "codex", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, HelmError::AlreadyRegistered(id) if id == "t1"));
        assert_eq!(
            registry.get("t1").await.unwrap().status_class,
            StatusClass::Running
        );
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_remove_publishes() {
        let bus = ViewBus::new(16);
        let registry = SessionRegistry::new(Duration::from_secs(30), bus.clone());
        registry
            .register(SessionRecord::new("b", "codex", 1))
            .await
            .unwrap();
        registry
            .register(SessionRecord::new("a", "codex", 0))
            .await
            .unwrap();
        assert_eq!(registry.next_ordinal().await, 2);

        let ids: Vec<String> = registry.list().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let mut rx = bus.subscribe();
        assert!(registry.remove("a").await.is_some());
        assert_eq!(
            rx.recv().await.unwrap(),
            ViewUpdate::SessionsChanged {
                session_ids: vec!["b".into()]
            }
        );
        assert!(registry.remove("a").await.is_none());
    }
}
