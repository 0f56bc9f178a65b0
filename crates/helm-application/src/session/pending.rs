use std::collections::HashMap;
use std::time::Duration;

use helm_core::session::SessionEvent;
use tokio::time::Instant;

/// An event that arrived for a session id nobody has registered yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub session_id: String,
    pub event: SessionEvent,
    pub received_at: Instant,
}

impl PendingEvent {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.received_at) >= ttl
    }
}

/// Holds at most one event per unregistered session id.
///
/// A later event for the same id overwrites the earlier one. Entries older
/// than the TTL are never handed out by [`claim`](Self::claim), whether or not
/// [`sweep`](Self::sweep) has run since they expired.
#[derive(Debug)]
pub struct PendingEventBuffer {
    entries: HashMap<String, PendingEvent>,
    ttl: Duration,
}

impl PendingEventBuffer {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Buffers `event` for `session_id`, returning the entry it displaced.
    pub fn hold(&mut self, session_id: &str, event: SessionEvent) -> Option<PendingEvent> {
        tracing::debug!(
            "[PendingEventBuffer] Holding {} event for unregistered session {}",
            event.label(),
            session_id
        );
        self.entries.insert(
            session_id.to_string(),
            PendingEvent {
                session_id: session_id.to_string(),
                event,
                received_at: Instant::now(),
            },
        )
    }

    /// Removes and returns the buffered event for `session_id` if it is still fresh.
    pub fn claim(&mut self, session_id: &str) -> Option<SessionEvent> {
        let pending = self.entries.remove(session_id)?;
        if pending.is_expired(self.ttl, Instant::now()) {
            tracing::warn!(
                "[PendingEventBuffer] Dropping expired {} event for session {} on registration",
                pending.event.label(),
                session_id
            );
            return None;
        }
        Some(pending.event)
    }

    /// Drops the buffered event for `session_id` without replaying it.
    pub fn discard(&mut self, session_id: &str) -> bool {
        self.entries.remove(session_id).is_some()
    }

    /// Purges every entry older than the TTL and returns the purged session ids.
    pub fn sweep(&mut self) -> Vec<String> {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut purged = Vec::new();
        self.entries.retain(|session_id, pending| {
            if pending.is_expired(ttl, now) {
                tracing::warn!(
                    "[PendingEventBuffer] Orphan {} event for session {} expired after {:?}",
                    pending.event.label(),
                    session_id,
                    ttl
                );
                purged.push(session_id.clone());
                false
            } else {
                true
            }
        });
        purged
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
