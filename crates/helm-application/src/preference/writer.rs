use helm_core::capability::CapabilityKind;
use helm_core::error::Result;
use helm_core::preference::{LastUsedOptions, PreferenceRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct WriterState {
    options: LastUsedOptions,
    dirty: bool,
    /// Bumped on every edit; a timer only flushes if it is still the latest.
    revision: u64,
    timer: Option<JoinHandle<()>>,
}

struct WriterInner {
    repository: Arc<dyn PreferenceRepository>,
    debounce: Duration,
    state: Mutex<WriterState>,
    /// Serialises saves so an older snapshot never lands after a newer one.
    save_lock: Mutex<()>,
}

/// Coalescing, debounced writer for the last-used option record.
///
/// Every edit updates the in-memory record at once and (re)starts a single
/// trailing timer; the record is written when the timer fires or on
/// [`flush`](Self::flush).
#[derive(Clone)]
pub struct PreferenceWriter {
    inner: Arc<WriterInner>,
}

impl PreferenceWriter {
    /// Creates a writer over an already loaded record.
    pub fn new(
        repository: Arc<dyn PreferenceRepository>,
        options: LastUsedOptions,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(WriterInner {
                repository,
                debounce,
                state: Mutex::new(WriterState {
                    options,
                    ..WriterState::default()
                }),
                save_lock: Mutex::new(()),
            }),
        }
    }

    /// Loads the record from `repository`, starting empty if the load fails.
    pub async fn load(repository: Arc<dyn PreferenceRepository>, debounce: Duration) -> Self {
        let options = match repository.load().await {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!(
                    "[PreferenceWriter] Failed to load last-used options, starting empty: {}",
                    e
                );
                LastUsedOptions::new()
            }
        };
        Self::new(repository, options, debounce)
    }

    /// Remembered option for (agent, kind).
    pub async fn get(&self, agent_id: &str, kind: CapabilityKind) -> Option<String> {
        let state = self.inner.state.lock().await;
        state.options.get(agent_id, kind).map(str::to_string)
    }

    /// Snapshot of the in-memory record, including unsaved edits.
    pub async fn options(&self) -> LastUsedOptions {
        self.inner.state.lock().await.options.clone()
    }

    pub async fn is_dirty(&self) -> bool {
        self.inner.state.lock().await.dirty
    }

    /// Records a selection and schedules a debounced write.
    ///
    /// Re-recording the current value schedules nothing.
    pub async fn record(&self, agent_id: &str, kind: CapabilityKind, option_id: &str) {
        let mut state = self.inner.state.lock().await;
        if !state.options.set(agent_id, kind, option_id) {
            return;
        }
        state.dirty = true;
        state.revision += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let revision = state.revision;
        let writer = self.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(writer.inner.debounce).await;
            writer.flush_scheduled(revision).await;
        }));
    }

    /// Writes pending edits now. Returns `Ok(false)` if nothing was pending.
    pub async fn flush(&self) -> Result<bool> {
        if let Some(timer) = self.inner.state.lock().await.timer.take() {
            timer.abort();
        }
        self.save_pending().await
    }

    async fn flush_scheduled(&self, revision: u64) {
        {
            let mut state = self.inner.state.lock().await;
            if state.revision != revision {
                return;
            }
            state.timer = None;
        }
        if let Err(e) = self.save_pending().await {
            tracing::warn!("[PreferenceWriter] Debounced save failed: {}", e);
        }
    }

    async fn save_pending(&self) -> Result<bool> {
        let _saving = self.inner.save_lock.lock().await;
        let snapshot = {
            let mut state = self.inner.state.lock().await;
            if !state.dirty {
                return Ok(false);
            }
            state.dirty = false;
            state.options.clone()
        };

        if let Err(e) = self.inner.repository.save(&snapshot).await {
            self.inner.state.lock().await.dirty = true;
            return Err(e);
        }
        tracing::debug!("[PreferenceWriter] Saved last-used options");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use helm_core::error::HelmError;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingRepository {
        saves: StdMutex<Vec<LastUsedOptions>>,
        fail: StdMutex<bool>,
    }

    impl RecordingRepository {
        fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PreferenceRepository for RecordingRepository {
        async fn load(&self) -> Result<LastUsedOptions> {
            Ok(LastUsedOptions::new())
        }

        async fn save(&self, options: &LastUsedOptions) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(HelmError::io("disk full"));
            }
            self.saves.lock().unwrap().push(options.clone());
            Ok(())
        }
    }

    fn writer(repository: Arc<RecordingRepository>) -> PreferenceWriter {
        PreferenceWriter::new(
            repository,
            LastUsedOptions::new(),
            Duration::from_millis(500),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_write() {
        let repository = Arc::new(RecordingRepository::default());
        let writer = writer(repository.clone());

        for model in ["gpt-5", "o3", "gpt-5-mini"] {
            writer.record("codex", CapabilityKind::Model, model).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(repository.save_count(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let saves = repository.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].get("codex", CapabilityKind::Model), Some("gpt-5-mini"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let repository = Arc::new(RecordingRepository::default());
        let writer = writer(repository.clone());

        writer.record("codex", CapabilityKind::Mode, "auto").await;
        assert!(writer.flush().await.unwrap());
        assert_eq!(repository.save_count(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(repository.save_count(), 1);
        assert!(!writer.flush().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_value_schedules_nothing() {
        let repository = Arc::new(RecordingRepository::default());
        let writer = writer(repository.clone());

        writer.record("codex", CapabilityKind::Model, "o3").await;
        writer.flush().await.unwrap();
        writer.record("codex", CapabilityKind::Model, "o3").await;

        assert!(!writer.is_dirty().await);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(repository.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_stays_dirty() {
        let repository = Arc::new(RecordingRepository::default());
        *repository.fail.lock().unwrap() = true;
        let writer = writer(repository.clone());

        writer.record("codex", CapabilityKind::Model, "o3").await;
        assert!(writer.flush().await.is_err());
        assert!(writer.is_dirty().await);

        *repository.fail.lock().unwrap() = false;
        assert!(writer.flush().await.unwrap());
        assert_eq!(repository.save_count(), 1);
    }
}
