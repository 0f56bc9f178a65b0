//! The owned console context.
//!
//! One `ConsoleContext` is built by the composing shell and shared by every
//! view. It owns the components, runs the event pump and the periodic sweep,
//! and exposes the downstream surface.

use helm_core::channel::{BackendChannel, BackendCommand, EventName, EventStream, invoke_as};
use helm_core::config::ConsoleConfig;
use helm_core::error::{HelmError, Result};
use helm_core::event::ChannelEvent;
use helm_core::preference::PreferenceRepository;
use helm_core::session::{SessionAck, SessionEvent, SessionRecord, StatusClass};
use helm_core::status::BackendStatus;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::capability::CapabilityCache;
use crate::preference::PreferenceWriter;
use crate::recording::RecordingController;
use crate::resource::ResourceManager;
use crate::session::{ApplyOutcome, SessionRegistry};
use crate::streaming::{StreamingMessage, StreamingReconciler, TranscriptMessage};
use crate::view::{ClearReason, Notice, ViewBus, ViewUpdate};

/// Cheap-to-clone handle over the console core.
#[derive(Clone)]
pub struct ConsoleContext {
    config: Arc<ConsoleConfig>,
    channel: Arc<dyn BackendChannel>,
    bus: ViewBus,
    registry: Arc<SessionRegistry>,
    reconciler: Arc<StreamingReconciler>,
    capabilities: CapabilityCache,
    resources: Arc<ResourceManager>,
    recording: RecordingController,
    preferences: PreferenceWriter,
    shutdown: CancellationToken,
}

impl ConsoleContext {
    /// Builds the context, loading the last-used option record from `repository`.
    pub async fn new(
        config: ConsoleConfig,
        channel: Arc<dyn BackendChannel>,
        repository: Arc<dyn PreferenceRepository>,
    ) -> Self {
        let preferences = PreferenceWriter::load(repository, config.preference_debounce()).await;
        Self::with_preferences(config, channel, preferences)
    }

    /// Builds the context over an existing preference writer.
    pub fn with_preferences(
        config: ConsoleConfig,
        channel: Arc<dyn BackendChannel>,
        preferences: PreferenceWriter,
    ) -> Self {
        let bus = ViewBus::new(config.view_bus_capacity);
        let registry = Arc::new(SessionRegistry::new(config.pending_ttl(), bus.clone()));
        let reconciler = Arc::new(StreamingReconciler::new(bus.clone()));
        let capabilities = CapabilityCache::new(channel.clone(), bus.clone(), preferences.clone());
        let resources = Arc::new(ResourceManager::new(channel.clone(), bus.clone()));
        let recording = RecordingController::new(
            channel.clone(),
            bus.clone(),
            resources.clone(),
            config.recording_tick(),
        );

        Self {
            config: Arc::new(config),
            channel,
            bus,
            registry,
            reconciler,
            capabilities,
            resources,
            recording,
            preferences,
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribes to every push stream, starts the sweep, and reattaches to
    /// backend state.
    ///
    /// # Errors
    ///
    /// Fails only if a subscription cannot be opened. A failed status poll is
    /// logged and leaves the resource and recording state empty.
    pub async fn start(&self) -> Result<()> {
        for name in EventName::iter() {
            let stream = self.channel.subscribe(name)?;
            self.spawn_forwarder(name, stream);
        }
        self.spawn_sweep();
        tracing::info!("[ConsoleContext] Event pump started");

        if let Err(e) = self.reattach().await {
            tracing::warn!("[ConsoleContext] Initial status poll failed: {}", e);
        }
        Ok(())
    }

    /// Polls `get-status` and reattaches the resource manager and recorder.
    pub async fn reattach(&self) -> Result<BackendStatus> {
        let status = self.resources.status().await?;
        self.recording.attach(status.recording.clone()).await;
        Ok(status)
    }

    /// Stops background tasks and flushes pending preference writes.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("[ConsoleContext] Shutting down");
        self.shutdown.cancel();
        self.recording.shutdown().await;
        self.preferences.flush().await?;
        Ok(())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Asks the backend for a new session and registers it on acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns the transport error after publishing a notice; nothing is
    /// registered in that case.
    pub async fn create_session(
        &self,
        agent_kind: &str,
        prompt: Option<String>,
    ) -> Result<SessionRecord> {
        let command = BackendCommand::CreateSession {
            agent_kind: agent_kind.to_string(),
            prompt,
        };
        let ack: SessionAck = match invoke_as(self.channel.as_ref(), command).await {
            Ok(ack) => ack,
            Err(e) => {
                tracing::warn!(
                    "[ConsoleContext] create-session for {} failed: {}",
                    agent_kind,
                    e
                );
                self.bus.notify(Notice::error(format!(
                    "Could not start a {agent_kind} session: {e}"
                )));
                return Err(e);
            }
        };

        let ordinal = self.registry.next_ordinal().await;
        let mut record = SessionRecord::new(ack.session_id, agent_kind, ordinal);
        record.resource_ref = ack.resource_ref;
        self.register_session(record).await
    }

    /// Registers an acknowledged session and replays its buffered event.
    pub async fn register_session(&self, record: SessionRecord) -> Result<SessionRecord> {
        let registration = self.registry.register(record).await?;
        let session_id = registration.record.id.clone();
        if let Some(event) = registration.replayed {
            self.arm_safety_net(&session_id, &event).await;
            if event.is_streaming() {
                self.reconciler.apply(&session_id, &event).await;
            }
        }
        Ok(registration.record)
    }

    /// Routes one session event through the registry and reconciler.
    pub async fn apply_event(&self, session_id: &str, event: SessionEvent) -> ApplyOutcome {
        let outcome = self.registry.apply(session_id, event.clone()).await;
        match &outcome {
            ApplyOutcome::Streaming(event) => self.reconciler.apply(session_id, event).await,
            ApplyOutcome::Applied(_) => self.arm_safety_net(session_id, &event).await,
            ApplyOutcome::Buffered | ApplyOutcome::Ignored => {}
        }
        outcome
    }

    /// Asks the backend to stop a session and unlocks its running→idle move.
    pub async fn request_stop(&self, session_id: &str) -> Result<SessionRecord> {
        if !self.registry.contains(session_id).await {
            return Err(HelmError::not_found("session", session_id));
        }
        let command = BackendCommand::StopSession {
            session_id: session_id.to_string(),
        };
        if let Err(e) = self.channel.invoke(command).await {
            tracing::warn!("[ConsoleContext] stop-session for {} failed: {}", session_id, e);
            self.bus
                .notify(Notice::error(format!("Could not stop session: {e}")));
            return Err(e);
        }
        self.registry.mark_stop_requested(session_id).await
    }

    /// Removes a session with its transcript and any buffered event.
    pub async fn delete_session(&self, session_id: &str) -> Result<SessionRecord> {
        let removed = self
            .registry
            .remove(session_id)
            .await
            .ok_or_else(|| HelmError::not_found("session", session_id))?;
        if self.reconciler.placeholder(session_id).await.is_some() {
            self.reconciler
                .clear(session_id, ClearReason::SessionDeleted)
                .await;
        }
        self.reconciler.remove_session(session_id).await;
        Ok(removed)
    }

    pub async fn get_session(&self, session_id: &str) -> Option<SessionRecord> {
        self.registry.get(session_id).await
    }

    /// All sessions ordered by display ordinal.
    pub async fn sessions(&self) -> Vec<SessionRecord> {
        self.registry.list().await
    }

    pub async fn transcript(&self, session_id: &str) -> Vec<TranscriptMessage> {
        self.reconciler.transcript(session_id).await
    }

    pub async fn placeholder(&self, session_id: &str) -> Option<StreamingMessage> {
        self.reconciler.placeholder(session_id).await
    }

    // ========================================================================
    // Channel events
    // ========================================================================

    /// Dispatches one decoded push event.
    pub async fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Session { session_id, event } => {
                self.apply_event(&session_id, event).await;
            }
            ChannelEvent::DownloadProgress {
                artifact_id,
                downloaded_bytes,
                total_bytes,
            } => {
                self.resources
                    .on_progress(&artifact_id, downloaded_bytes, total_bytes)
                    .await;
            }
            ChannelEvent::DownloadStatus {
                artifact_id,
                state,
                error,
            } => {
                self.resources.on_status(&artifact_id, state, error).await;
            }
        }
    }

    /// Runs one sweep: purges orphan events and idle placeholders.
    pub async fn sweep(&self) {
        let purged = self.registry.sweep().await;
        let cleared = self
            .reconciler
            .sweep_idle(self.config.stream_idle_timeout())
            .await;
        if purged > 0 || !cleared.is_empty() {
            tracing::debug!(
                "[ConsoleContext] Sweep purged {} orphan events, cleared {} placeholders",
                purged,
                cleared.len()
            );
        }
    }

    /// Schedules the safety-net clear after a settled status.
    ///
    /// Only the placeholder present at arming time is cleared; a chunk that
    /// lands in the meantime keeps it alive.
    async fn arm_safety_net(&self, session_id: &str, event: &SessionEvent) {
        let settled = matches!(
            event,
            SessionEvent::Status { state, .. } if *state != StatusClass::Running
        );
        if !settled {
            return;
        }
        let Some(placeholder) = self.reconciler.placeholder(session_id).await else {
            return;
        };

        let reconciler = self.reconciler.clone();
        let session_id = session_id.to_string();
        let delay = self.config.stream_safety_net();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reconciler
                .clear_if_unchanged(
                    &session_id,
                    placeholder.sequence,
                    ClearReason::TerminalStatus,
                )
                .await;
        });
    }

    fn spawn_forwarder(&self, name: EventName, mut stream: EventStream) {
        let context = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = context.shutdown.cancelled() => break,
                    payload = stream.recv() => {
                        let Some(payload) = payload else {
                            tracing::debug!("[ConsoleContext] {} stream closed", name);
                            break;
                        };
                        match ChannelEvent::decode_known(name, payload) {
                            Ok(event) => context.handle_event(event).await,
                            Err(e) => tracing::warn!("[ConsoleContext] Dropping malformed event: {}", e),
                        }
                    }
                }
            }
        });
    }

    fn spawn_sweep(&self) {
        let context = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(context.config.sweep_interval());
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = context.shutdown.cancelled() => break,
                    _ = interval.tick() => context.sweep().await,
                }
            }
        });
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Subscribes to the view-update stream.
    pub fn subscribe_view(&self) -> broadcast::Receiver<ViewUpdate> {
        self.bus.subscribe()
    }

    pub fn view_bus(&self) -> &ViewBus {
        &self.bus
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &CapabilityCache {
        &self.capabilities
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn recording(&self) -> &RecordingController {
        &self.recording
    }

    pub fn preferences(&self) -> &PreferenceWriter {
        &self.preferences
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
