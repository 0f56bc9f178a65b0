use helm_core::channel::{BackendChannel, BackendCommand};
use helm_core::error::{HelmError, Result};
use helm_core::recording::{RecordingSegment, RecordingSession, RecordingState, RecordingStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::clock::ElapsedClock;
use crate::resource::ResourceManager;
use crate::view::{Notice, NoticeAction, ViewBus, ViewUpdate};

/// State restored when the backend rejects a transition.
#[derive(Debug, Clone)]
struct Checkpoint {
    session: RecordingSession,
    clock: ElapsedClock,
    segment_start: u64,
}

/// Where a transition left the session. A rollback only applies while the
/// session is still there.
#[derive(Debug, Clone, PartialEq)]
struct Landing {
    session_id: Option<String>,
    state: RecordingState,
}

#[derive(Debug, Default)]
struct RecorderState {
    session: RecordingSession,
    clock: ElapsedClock,
    /// Clock reading at which the open segment began
    segment_start: u64,
    ticker: Option<JoinHandle<()>>,
}

impl RecorderState {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            session: self.session.clone(),
            clock: self.clock,
            segment_start: self.segment_start,
        }
    }

    fn landing(&self) -> Landing {
        Landing {
            session_id: self.session.session_id.clone(),
            state: self.session.state,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.session = checkpoint.session;
        self.clock = checkpoint.clock;
        self.segment_start = checkpoint.segment_start;
    }

    fn sync_elapsed(&mut self) {
        self.session.elapsed_seconds = self.clock.elapsed_seconds();
    }

    fn close_segment(&mut self) {
        let elapsed = self.clock.elapsed_seconds();
        self.session.segments.push(RecordingSegment {
            started_at_elapsed: self.segment_start,
            duration_seconds: elapsed.saturating_sub(self.segment_start),
        });
    }

    fn live_session_id(&self, operation: &'static str) -> Result<String> {
        self.session
            .session_id
            .clone()
            .filter(|_| self.session.state.is_live())
            .ok_or_else(|| HelmError::invalid_recording_state(operation, self.session.state))
    }
}

struct RecorderInner {
    channel: Arc<dyn BackendChannel>,
    bus: ViewBus,
    resources: Arc<ResourceManager>,
    tick: Duration,
    state: Mutex<RecorderState>,
    watch: watch::Sender<RecordingSession>,
}

/// State machine for one capture session at a time.
///
/// idle → recording ⇄ paused → stopped. Stopped is terminal for its session
/// id; the next `start` allocates a fresh one. The elapsed clock runs locally
/// and is only overridden by a backend-reported value on [`attach`](Self::attach).
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<RecorderInner>,
}

impl RecordingController {
    pub fn new(
        channel: Arc<dyn BackendChannel>,
        bus: ViewBus,
        resources: Arc<ResourceManager>,
        tick: Duration,
    ) -> Self {
        let (watch, _) = watch::channel(RecordingSession::default());
        Self {
            inner: Arc::new(RecorderInner {
                channel,
                bus,
                resources,
                tick,
                state: Mutex::new(RecorderState::default()),
                watch,
            }),
        }
    }

    /// Starts a new capture session with the active artifact.
    ///
    /// # Errors
    ///
    /// - `NoActiveArtifact` if no artifact is active; a notice points the
    ///   user to the resource manager
    /// - `InvalidRecordingState` if a session is already live
    /// - `Transport` if the backend rejects the start; prior state is restored
    pub async fn start(&self) -> Result<String> {
        let Some(artifact) = self.inner.resources.active_artifact().await else {
            self.inner.bus.notify(
                Notice::warning("Activate a speech model before recording")
                    .with_action(NoticeAction::OpenResourceManager),
            );
            return Err(HelmError::NoActiveArtifact);
        };

        let (session_id, previous, landing) = {
            let mut state = self.inner.state.lock().await;
            if state.session.state.is_live() {
                return Err(HelmError::invalid_recording_state(
                    "start",
                    state.session.state,
                ));
            }
            let previous = state.checkpoint();
            let session_id = Uuid::new_v4().to_string();
            state.session = RecordingSession {
                session_id: Some(session_id.clone()),
                state: RecordingState::Recording,
                elapsed_seconds: 0,
                segments: Vec::new(),
            };
            state.clock = ElapsedClock::default();
            state.clock.start();
            state.segment_start = 0;
            (session_id, previous, state.landing())
        };
        self.publish().await;

        let command = BackendCommand::StartRecording {
            session_id: session_id.clone(),
            artifact_id: artifact.id.clone(),
        };
        if let Err(e) = self.inner.channel.invoke(command).await {
            self.roll_back("start", previous, landing, &e).await;
            return Err(e);
        }
        tracing::info!(
            "[RecordingController] Recording {} started with {}",
            session_id,
            artifact.id
        );
        self.sync_ticker().await;
        Ok(session_id)
    }

    /// recording → paused. Closes the open segment and freezes the clock.
    pub async fn pause(&self) -> Result<()> {
        self.transition("pause", |state| {
            let session_id = state.live_session_id("pause")?;
            if state.session.state != RecordingState::Recording {
                return Err(HelmError::invalid_recording_state(
                    "pause",
                    state.session.state,
                ));
            }
            state.close_segment();
            state.clock.pause();
            state.session.state = RecordingState::Paused;
            Ok(BackendCommand::PauseRecording { session_id })
        })
        .await
    }

    /// paused → recording. Opens a new segment at the current reading.
    pub async fn resume(&self) -> Result<()> {
        self.transition("resume", |state| {
            let session_id = state.live_session_id("resume")?;
            if state.session.state != RecordingState::Paused {
                return Err(HelmError::invalid_recording_state(
                    "resume",
                    state.session.state,
                ));
            }
            state.segment_start = state.clock.elapsed_seconds();
            state.clock.start();
            state.session.state = RecordingState::Recording;
            Ok(BackendCommand::ResumeRecording { session_id })
        })
        .await
    }

    /// recording | paused → stopped.
    pub async fn stop(&self) -> Result<()> {
        self.transition("stop", |state| {
            let session_id = state.live_session_id("stop")?;
            if state.session.state == RecordingState::Recording {
                state.close_segment();
            }
            state.clock.pause();
            state.session.state = RecordingState::Stopped;
            Ok(BackendCommand::StopRecording { session_id })
        })
        .await
    }

    /// Reattaches to a session the backend reports as live.
    ///
    /// The backend's elapsed value wins over the local reading. A report that
    /// the session is no longer live stops a locally live session.
    pub async fn attach(&self, status: Option<RecordingStatus>) {
        {
            let mut state = self.inner.state.lock().await;
            match status {
                Some(status) if status.state.is_live() => {
                    let same_session =
                        state.session.session_id.as_deref() == Some(status.session_id.as_str());
                    if !same_session {
                        state.session.segments.clear();
                    }
                    state.session.session_id = Some(status.session_id.clone());
                    state.session.state = status.state;
                    state
                        .clock
                        .reset(Duration::from_secs(status.elapsed_seconds));
                    if status.state == RecordingState::Recording {
                        state.clock.start();
                    }
                    state.segment_start = status.elapsed_seconds;
                    tracing::info!(
                        "[RecordingController] Attached to {} ({}, {}s)",
                        status.session_id,
                        status.state,
                        status.elapsed_seconds
                    );
                }
                Some(status) if state.session.state.is_live() => {
                    tracing::warn!(
                        "[RecordingController] Backend reports {}; stopping local session",
                        status.state
                    );
                    if state.session.state == RecordingState::Recording {
                        state.close_segment();
                    }
                    state.clock.pause();
                    state.session.state = RecordingState::Stopped;
                }
                _ => {}
            }
            state.sync_elapsed();
        }
        self.publish().await;
        self.sync_ticker().await;
    }

    /// Current state with an up-to-date elapsed reading.
    pub async fn snapshot(&self) -> RecordingSession {
        let mut state = self.inner.state.lock().await;
        state.sync_elapsed();
        state.session.clone()
    }

    /// Subscribes to state changes and clock ticks.
    pub fn subscribe(&self) -> watch::Receiver<RecordingSession> {
        self.inner.watch.subscribe()
    }

    /// Stops the ticker. The session itself is left as is.
    pub async fn shutdown(&self) {
        if let Some(ticker) = self.inner.state.lock().await.ticker.take() {
            ticker.abort();
        }
    }

    async fn transition<F>(&self, operation: &'static str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut RecorderState) -> Result<BackendCommand>,
    {
        let (previous, landing, command) = {
            let mut state = self.inner.state.lock().await;
            let previous = state.checkpoint();
            let command = apply(&mut *state)?;
            (previous, state.landing(), command)
        };
        self.publish().await;

        if let Err(e) = self.inner.channel.invoke(command).await {
            self.roll_back(operation, previous, landing, &e).await;
            return Err(e);
        }
        tracing::debug!("[RecordingController] {} acknowledged", operation);
        self.sync_ticker().await;
        Ok(())
    }

    async fn roll_back(
        &self,
        operation: &'static str,
        previous: Checkpoint,
        landing: Landing,
        error: &HelmError,
    ) {
        {
            let mut state = self.inner.state.lock().await;
            if state.landing() == landing {
                tracing::warn!(
                    "[RecordingController] {} rejected, restoring previous state: {}",
                    operation,
                    error
                );
                state.restore(previous);
            } else {
                tracing::warn!(
                    "[RecordingController] {} rejected after a later transition; keeping {}: {}",
                    operation,
                    state.session.state,
                    error
                );
            }
        }
        self.publish().await;
        self.sync_ticker().await;
        self.inner
            .bus
            .notify(Notice::error(format!("Could not {operation} recording: {error}")));
    }

    async fn publish(&self) {
        let session = self.snapshot().await;
        self.inner.watch.send_replace(session.clone());
        self.inner
            .bus
            .publish(ViewUpdate::RecordingChanged { session });
    }

    /// Runs the ticker while recording and stops it otherwise.
    async fn sync_ticker(&self) {
        let mut state = self.inner.state.lock().await;
        if state.session.state == RecordingState::Recording {
            let running = state.ticker.as_ref().is_some_and(|t| !t.is_finished());
            if !running {
                let controller = self.clone();
                state.ticker = Some(tokio::spawn(async move { controller.run_ticker().await }));
            }
        } else if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
    }

    async fn run_ticker(&self) {
        let mut interval = tokio::time::interval(self.inner.tick);
        interval.tick().await;
        loop {
            interval.tick().await;
            let session = {
                let mut state = self.inner.state.lock().await;
                if state.session.state != RecordingState::Recording {
                    break;
                }
                state.sync_elapsed();
                state.session.clone()
            };
            self.inner.watch.send_replace(session.clone());
            self.inner
                .bus
                .publish(ViewUpdate::RecordingChanged { session });
        }
    }
}
