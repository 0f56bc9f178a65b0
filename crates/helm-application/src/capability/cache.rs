use helm_core::capability::{CapabilityCacheEntry, CapabilityItem, CapabilityKey};
use helm_core::channel::{BackendChannel, BackendCommand, invoke_as};
use helm_core::error::{HelmError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::preference::PreferenceWriter;
use crate::view::{ViewBus, ViewUpdate};

/// What a completed refresh did with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Changed and the key was active: cache and view updated
    Applied,
    /// Changed but the key was no longer active: cache updated, view untouched
    CachedOnly,
    /// Same items as before
    Unchanged,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CapabilityKey, CapabilityCacheEntry>,
    active: Option<CapabilityKey>,
    selections: HashMap<CapabilityKey, String>,
}

struct CacheInner {
    channel: Arc<dyn BackendChannel>,
    bus: ViewBus,
    preferences: PreferenceWriter,
    state: RwLock<CacheState>,
    generation: AtomicU64,
}

/// Stale-while-revalidate cache of agent option lists.
///
/// A cache hit is returned at once and revalidated in the background. A
/// refresh only reaches the view if no [`activate`](CapabilityCache::activate)
/// happened while it was in flight and its key is still the active key;
/// otherwise it only updates the cache.
#[derive(Clone)]
pub struct CapabilityCache {
    inner: Arc<CacheInner>,
}

impl CapabilityCache {
    pub fn new(
        channel: Arc<dyn BackendChannel>,
        bus: ViewBus,
        preferences: PreferenceWriter,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                channel,
                bus,
                preferences,
                state: RwLock::new(CacheState::default()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Makes `key` the one the view is showing, then serves it like [`get`](Self::get).
    ///
    /// A cached list is presented immediately; a miss is presented once the
    /// first fetch completes.
    pub async fn activate(&self, key: CapabilityKey) -> Result<CapabilityCacheEntry> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cached = {
            let mut state = self.inner.state.write().await;
            state.active = Some(key.clone());
            state.entries.get(&key).cloned()
        };
        tracing::debug!(
            "[CapabilityCache] Activated {} (generation {}, cached: {})",
            key,
            generation,
            cached.is_some()
        );

        match cached {
            Some(entry) => {
                self.present(&entry).await;
                self.spawn_refresh(key);
                Ok(entry)
            }
            None => self.fetch(&key).await.map(|(_, entry)| entry),
        }
    }

    /// Returns the cached list at once and schedules a refresh, or awaits the
    /// first fetch on a miss.
    pub async fn get(&self, key: &CapabilityKey) -> Result<CapabilityCacheEntry> {
        let cached = self.cached(key).await;
        match cached {
            Some(entry) => {
                self.spawn_refresh(key.clone());
                Ok(entry)
            }
            None => self.fetch(key).await.map(|(_, entry)| entry),
        }
    }

    /// Fetches `key` from the backend and reconciles the result.
    ///
    /// A failed fetch leaves the cache untouched.
    pub async fn refresh(&self, key: &CapabilityKey) -> Result<RefreshOutcome> {
        self.fetch(key).await.map(|(outcome, _)| outcome)
    }

    /// Cached entry for `key` without triggering a refresh.
    pub async fn cached(&self, key: &CapabilityKey) -> Option<CapabilityCacheEntry> {
        self.inner.state.read().await.entries.get(key).cloned()
    }

    pub async fn active_key(&self) -> Option<CapabilityKey> {
        self.inner.state.read().await.active.clone()
    }

    /// Current selection generation; bumped by every [`activate`](Self::activate).
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Option currently selected for `key`.
    pub async fn selection(&self, key: &CapabilityKey) -> Option<String> {
        self.inner.state.read().await.selections.get(key).cloned()
    }

    /// A user edit: selects `option_id` and queues it for persistence.
    ///
    /// # Errors
    ///
    /// Returns `HelmError::NotFound` if `option_id` is not in the cached list.
    pub async fn select_option(&self, key: &CapabilityKey, option_id: &str) -> Result<()> {
        let known = self
            .cached(key)
            .await
            .is_some_and(|entry| entry.contains(option_id));
        if !known {
            return Err(HelmError::not_found("capability option", option_id));
        }
        self.apply_selection(key, option_id, false).await;
        Ok(())
    }

    /// Drops every cached kind for `agent_id`. Returns the number of entries removed.
    pub async fn invalidate(&self, agent_id: &str) -> usize {
        let mut state = self.inner.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|key, _| key.agent_id != agent_id);
        state.selections.retain(|key, _| key.agent_id != agent_id);
        let removed = before - state.entries.len();
        tracing::debug!(
            "[CapabilityCache] Invalidated {} entries for agent {}",
            removed,
            agent_id
        );
        removed
    }

    fn spawn_refresh(&self, key: CapabilityKey) {
        let cache = self.clone();
        tokio::spawn(async move {
            // Failures are already logged by fetch.
            let _ = cache.refresh(&key).await;
        });
    }

    async fn fetch(&self, key: &CapabilityKey) -> Result<(RefreshOutcome, CapabilityCacheEntry)> {
        let requested_at = self.generation();
        let command = BackendCommand::ListCapabilities {
            agent_id: key.agent_id.clone(),
            kind: key.kind,
        };
        let items: Vec<CapabilityItem> = invoke_as(self.inner.channel.as_ref(), command)
            .await
            .inspect_err(|e| {
                tracing::warn!("[CapabilityCache] Refresh of {} failed: {}", key, e);
            })?;

        let (outcome, entry) = {
            let mut state = self.inner.state.write().await;
            let changed = state
                .entries
                .get(key)
                .is_none_or(|entry| entry.items != items);
            let current =
                self.generation() == requested_at && state.active.as_ref() == Some(key);
            let entry = CapabilityCacheEntry::new(key.clone(), items);
            state.entries.insert(key.clone(), entry.clone());

            let outcome = match (changed, current) {
                (false, _) => RefreshOutcome::Unchanged,
                (true, true) => RefreshOutcome::Applied,
                (true, false) => RefreshOutcome::CachedOnly,
            };
            (outcome, entry)
        };

        match outcome {
            RefreshOutcome::Applied => self.present(&entry).await,
            RefreshOutcome::CachedOnly => tracing::debug!(
                "[CapabilityCache] Stale response for {} (requested at generation {}, now {}); cached only",
                key,
                requested_at,
                self.generation()
            ),
            RefreshOutcome::Unchanged => {}
        }
        Ok((outcome, entry))
    }

    /// Shows `entry` in the view and restores a selection into it.
    async fn present(&self, entry: &CapabilityCacheEntry) {
        self.inner.bus.publish(ViewUpdate::CapabilitiesChanged {
            key: entry.key.clone(),
            items: entry.items.clone(),
        });
        self.hydrate(entry).await;
    }

    /// Keeps the current selection if it survived, else the remembered option,
    /// else the first item. Never persists.
    async fn hydrate(&self, entry: &CapabilityCacheEntry) {
        let Some(first) = entry.items.first() else {
            return;
        };
        let key = &entry.key;
        let current = self.selection(key).await;
        let remembered = self.inner.preferences.get(&key.agent_id, key.kind).await;
        let option_id = current
            .filter(|id| entry.contains(id))
            .or(remembered.filter(|id| entry.contains(id)))
            .unwrap_or_else(|| first.id.clone());

        self.apply_selection(key, &option_id, true).await;
    }

    /// Records a selection. `restored` selections come from hydration and are
    /// never queued for persistence.
    async fn apply_selection(&self, key: &CapabilityKey, option_id: &str, restored: bool) {
        self.inner
            .state
            .write()
            .await
            .selections
            .insert(key.clone(), option_id.to_string());
        self.inner.bus.publish(ViewUpdate::OptionSelected {
            key: key.clone(),
            option_id: option_id.to_string(),
            restored,
        });

        if restored {
            tracing::debug!(
                "[CapabilityCache] Restored {} = {} without persisting",
                key,
                option_id
            );
        } else {
            self.inner
                .preferences
                .record(&key.agent_id, key.kind, option_id)
                .await;
        }
    }
}
