use helm_core::channel::{BackendChannel, BackendCommand, invoke_as};
use helm_core::error::{HelmError, Result};
use helm_core::resource::{DownloadJob, DownloadState, ResourceArtifact};
use helm_core::status::BackendStatus;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::view::{ArtifactView, Notice, NoticeAction, ViewBus, ViewUpdate};

#[derive(Debug, Default)]
struct ResourceState {
    /// Catalog in backend order
    artifacts: Vec<ResourceArtifact>,
    /// The current or most recent download job
    job: Option<DownloadJob>,
}

impl ResourceState {
    fn artifact(&self, artifact_id: &str) -> Result<&ResourceArtifact> {
        self.artifacts
            .iter()
            .find(|a| a.id == artifact_id)
            .ok_or_else(|| HelmError::not_found("artifact", artifact_id))
    }

    fn artifact_mut(&mut self, artifact_id: &str) -> Option<&mut ResourceArtifact> {
        self.artifacts.iter_mut().find(|a| a.id == artifact_id)
    }

    fn active_job(&self) -> Option<&DownloadJob> {
        self.job.as_ref().filter(|job| job.is_active())
    }

    fn views(&self) -> Vec<ArtifactView> {
        self.artifacts
            .iter()
            .map(|artifact| ArtifactView {
                artifact: artifact.clone(),
                state: artifact.lifecycle(self.job.as_ref()),
            })
            .collect()
    }
}

/// Lifecycle manager for downloadable local artifacts.
///
/// `ResourceManager` is responsible for:
/// - Mirroring the backend catalog (presence on disk, active selection)
/// - Serialising downloads: at most one job occupies the download slot
/// - Folding `download-progress` / `download-status` events into the job
/// - Activation and deletion with their preconditions
///
/// Cancellation is cooperative: `cancel` only flags the job, and the
/// transition to cancelled happens when the backend confirms it.
pub struct ResourceManager {
    channel: Arc<dyn BackendChannel>,
    bus: ViewBus,
    state: RwLock<ResourceState>,
}

impl ResourceManager {
    pub fn new(channel: Arc<dyn BackendChannel>, bus: ViewBus) -> Self {
        Self {
            channel,
            bus,
            state: RwLock::new(ResourceState::default()),
        }
    }

    /// Polls `get-status` and adopts the backend's view of artifacts and the
    /// download job.
    ///
    /// A view opened mid-download uses this to recover progress it missed.
    pub async fn status(&self) -> Result<BackendStatus> {
        let status: BackendStatus =
            invoke_as(self.channel.as_ref(), BackendCommand::GetStatus)
                .await
                .inspect_err(|e| tracing::warn!("[ResourceManager] Status poll failed: {}", e))?;

        {
            let mut state = self.state.write().await;
            state.artifacts = status.artifacts.clone();
            state.job = status.download.clone();
        }
        tracing::debug!(
            "[ResourceManager] Reattached: {} artifacts, download: {:?}",
            status.artifacts.len(),
            status.download.as_ref().map(|job| &job.artifact_id)
        );
        self.publish_resources().await;
        if let Some(job) = status.download.clone() {
            self.bus.publish(ViewUpdate::DownloadProgress { job });
        }
        Ok(status)
    }

    /// Starts downloading `artifact_id`.
    ///
    /// # Errors
    ///
    /// - `DownloadInProgress` if another job holds the slot (no side effects)
    /// - `NotFound` / `ArtifactAlreadyDownloaded` for an invalid target
    /// - `Transport` if the backend rejects the start; the slot is released
    pub async fn start_download(&self, artifact_id: &str) -> Result<()> {
        let previous = {
            let mut state = self.state.write().await;
            if let Some(job) = state.active_job() {
                return Err(HelmError::DownloadInProgress(job.artifact_id.clone()));
            }
            let artifact = state.artifact(artifact_id)?;
            if artifact.downloaded {
                return Err(HelmError::ArtifactAlreadyDownloaded(artifact_id.to_string()));
            }
            let total = artifact.size_bytes;
            state
                .job
                .replace(DownloadJob::started(artifact_id, total))
        };
        tracing::info!("[ResourceManager] Starting download of {}", artifact_id);
        self.publish_resources().await;

        let command = BackendCommand::StartDownload {
            artifact_id: artifact_id.to_string(),
        };
        if let Err(e) = self.channel.invoke(command).await {
            {
                let mut state = self.state.write().await;
                let ours = state
                    .job
                    .as_ref()
                    .is_some_and(|job| job.artifact_id == artifact_id && job.is_active());
                if ours {
                    state.job = previous;
                }
            }
            tracing::warn!(
                "[ResourceManager] start-download for {} failed: {}",
                artifact_id,
                e
            );
            self.publish_resources().await;
            self.bus
                .notify(Notice::error(format!("Could not start download: {e}")));
            return Err(e);
        }
        Ok(())
    }

    /// Requests cancellation of the active download.
    ///
    /// The job stays downloading until a `download-status(cancelled)` arrives.
    pub async fn cancel(&self) -> Result<()> {
        let (artifact_id, job) = {
            let mut state = self.state.write().await;
            let job = state
                .job
                .as_mut()
                .filter(|job| job.is_active())
                .ok_or(HelmError::NoActiveDownload)?;
            job.cancel_requested = true;
            (job.artifact_id.clone(), job.clone())
        };
        self.bus.publish(ViewUpdate::DownloadProgress { job });

        let command = BackendCommand::CancelDownload {
            artifact_id: artifact_id.clone(),
        };
        if let Err(e) = self.channel.invoke(command).await {
            let mut state = self.state.write().await;
            if let Some(job) = state.job.as_mut().filter(|j| j.artifact_id == artifact_id) {
                job.cancel_requested = false;
            }
            drop(state);
            self.bus
                .notify(Notice::error(format!("Could not cancel download: {e}")));
            return Err(e);
        }
        tracing::debug!("[ResourceManager] Cancel requested for {}", artifact_id);
        Ok(())
    }

    /// Makes `artifact_id` the single active artifact.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactNotDownloaded` unless the artifact is on disk.
    pub async fn set_active(&self, artifact_id: &str) -> Result<()> {
        {
            let state = self.state.read().await;
            let artifact = state.artifact(artifact_id)?;
            if !artifact.downloaded {
                return Err(HelmError::ArtifactNotDownloaded(artifact_id.to_string()));
            }
            if artifact.active {
                return Ok(());
            }
        }

        let command = BackendCommand::SetActive {
            artifact_id: artifact_id.to_string(),
        };
        if let Err(e) = self.channel.invoke(command).await {
            self.bus
                .notify(Notice::error(format!("Could not activate {artifact_id}: {e}")));
            return Err(e);
        }

        {
            let mut state = self.state.write().await;
            for artifact in &mut state.artifacts {
                artifact.active = artifact.id == artifact_id;
            }
        }
        tracing::info!("[ResourceManager] Activated {}", artifact_id);
        self.publish_resources().await;
        Ok(())
    }

    /// Deletes the on-disk copy of `artifact_id`.
    ///
    /// # Errors
    ///
    /// - `ArtifactActive` if it is the active artifact
    /// - `ArtifactBusy` if it is being downloaded
    /// - `ArtifactNotDownloaded` if there is nothing to delete
    pub async fn delete(&self, artifact_id: &str) -> Result<()> {
        {
            let state = self.state.read().await;
            let artifact = state.artifact(artifact_id)?;
            if artifact.active {
                return Err(HelmError::ArtifactActive(artifact_id.to_string()));
            }
            if state
                .active_job()
                .is_some_and(|job| job.artifact_id == artifact_id)
            {
                return Err(HelmError::ArtifactBusy(artifact_id.to_string()));
            }
            if !artifact.downloaded {
                return Err(HelmError::ArtifactNotDownloaded(artifact_id.to_string()));
            }
        }

        let command = BackendCommand::DeleteArtifact {
            artifact_id: artifact_id.to_string(),
        };
        if let Err(e) = self.channel.invoke(command).await {
            self.bus
                .notify(Notice::error(format!("Could not delete {artifact_id}: {e}")));
            return Err(e);
        }

        {
            let mut state = self.state.write().await;
            if let Some(artifact) = state.artifact_mut(artifact_id) {
                artifact.downloaded = false;
                artifact.active = false;
            }
            if state
                .job
                .as_ref()
                .is_some_and(|job| job.artifact_id == artifact_id)
            {
                state.job = None;
            }
        }
        tracing::info!("[ResourceManager] Deleted {}", artifact_id);
        self.publish_resources().await;
        Ok(())
    }

    /// Folds a `download-progress` event into the job.
    ///
    /// Progress for an absent catalog artifact with no local job adopts it as
    /// the active job, which is how a view that missed the start catches up.
    /// Progress and status arrive on separate streams, so a late progress
    /// event for a job that already ended is dropped.
    pub async fn on_progress(&self, artifact_id: &str, downloaded_bytes: u64, total_bytes: u64) {
        let job = {
            let mut state = self.state.write().await;
            if state.active_job().is_none() {
                let absent = state
                    .artifacts
                    .iter()
                    .any(|a| a.id == artifact_id && !a.downloaded);
                let ended = state
                    .job
                    .as_ref()
                    .is_some_and(|job| job.artifact_id == artifact_id && job.state.is_terminal());
                if !absent || ended {
                    tracing::debug!(
                        "[ResourceManager] Ignoring late progress for {}",
                        artifact_id
                    );
                    return;
                }
                tracing::debug!(
                    "[ResourceManager] Adopting in-flight download of {}",
                    artifact_id
                );
                state.job = Some(DownloadJob::started(artifact_id, total_bytes));
            }
            let Some(job) = state
                .job
                .as_mut()
                .filter(|job| job.artifact_id == artifact_id && job.is_active())
            else {
                tracing::warn!(
                    "[ResourceManager] Ignoring progress for {}: another download is active",
                    artifact_id
                );
                return;
            };
            job.downloaded_bytes = downloaded_bytes;
            job.total_bytes = total_bytes;
            job.clone()
        };
        self.bus.publish(ViewUpdate::DownloadProgress { job });
    }

    /// Folds a `download-status` event into the job and catalog.
    ///
    /// `ready` marks the artifact downloaded without activating it.
    pub async fn on_status(&self, artifact_id: &str, download: DownloadState, error: Option<String>) {
        let job = {
            let mut state = self.state.write().await;
            if state.artifact_mut(artifact_id).is_none() {
                tracing::warn!(
                    "[ResourceManager] download-status for unknown artifact {}",
                    artifact_id
                );
                return;
            }

            let job = state
                .job
                .get_or_insert_with(|| DownloadJob::started(artifact_id, 0));
            if job.artifact_id != artifact_id {
                if job.is_active() {
                    tracing::warn!(
                        "[ResourceManager] Ignoring {} status for {}: {} is downloading",
                        download,
                        artifact_id,
                        job.artifact_id
                    );
                    return;
                }
                *job = DownloadJob::started(artifact_id, 0);
            }

            job.state = download;
            match download {
                DownloadState::Ready => {
                    job.downloaded_bytes = job.total_bytes;
                    job.error = None;
                }
                DownloadState::Error => {
                    job.error = Some(error.unwrap_or_else(|| "download failed".to_string()));
                }
                DownloadState::Cancelled | DownloadState::Downloading | DownloadState::Idle => {}
            }
            let job = job.clone();

            if download == DownloadState::Ready
                && let Some(artifact) = state.artifact_mut(artifact_id)
            {
                artifact.downloaded = true;
            }
            job
        };

        match job.state {
            DownloadState::Ready => {
                tracing::info!("[ResourceManager] {} downloaded", artifact_id);
            }
            DownloadState::Cancelled => {
                tracing::info!("[ResourceManager] Download of {} cancelled", artifact_id);
            }
            DownloadState::Error => {
                let message = job.error.clone().unwrap_or_default();
                tracing::warn!(
                    "[ResourceManager] Download of {} failed: {}",
                    artifact_id,
                    message
                );
                self.bus.notify(
                    Notice::error(format!("Download failed: {message}")).with_action(
                        NoticeAction::RetryDownload {
                            artifact_id: artifact_id.to_string(),
                        },
                    ),
                );
            }
            DownloadState::Downloading | DownloadState::Idle => {}
        }
        self.bus.publish(ViewUpdate::DownloadProgress { job });
        self.publish_resources().await;
    }

    pub async fn artifacts(&self) -> Vec<ArtifactView> {
        self.state.read().await.views()
    }

    pub async fn artifact(&self, artifact_id: &str) -> Option<ResourceArtifact> {
        self.state.read().await.artifact(artifact_id).ok().cloned()
    }

    /// The current or most recent download job.
    pub async fn job(&self) -> Option<DownloadJob> {
        self.state.read().await.job.clone()
    }

    pub async fn active_artifact(&self) -> Option<ResourceArtifact> {
        self.state
            .read()
            .await
            .artifacts
            .iter()
            .find(|a| a.active && a.downloaded)
            .cloned()
    }

    async fn publish_resources(&self) {
        let artifacts = self.artifacts().await;
        self.bus.publish(ViewUpdate::ResourcesChanged { artifacts });
    }
}
