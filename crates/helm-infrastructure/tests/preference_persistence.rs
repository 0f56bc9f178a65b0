use helm_application::PreferenceWriter;
use helm_core::capability::CapabilityKind;
use helm_core::preference::PreferenceRepository;
use helm_infrastructure::{HelmPaths, TomlPreferenceRepository};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread")]
async fn test_flush_persists_pending_selection() {
    let temp_dir = TempDir::new().unwrap();
    let paths = HelmPaths::at(temp_dir.path());
    let repository = Arc::new(TomlPreferenceRepository::new(&paths));

    let writer = PreferenceWriter::load(repository.clone(), Duration::from_secs(60)).await;
    writer
        .record("codex", CapabilityKind::Model, "gpt-5-mini")
        .await;
    assert!(writer.is_dirty().await);

    assert!(writer.flush().await.unwrap());

    let reopened = TomlPreferenceRepository::new(&paths).load().await.unwrap();
    assert_eq!(
        reopened.get("codex", CapabilityKind::Model),
        Some("gpt-5-mini")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_legacy_file_is_restored_then_rewritten() {
    let temp_dir = TempDir::new().unwrap();
    let paths = HelmPaths::at(temp_dir.path());
    std::fs::write(
        paths.preferences_file(),
        "version = \"1.0.0\"\n\n[models]\ncodex = \"o3\"\n",
    )
    .unwrap();
    let repository = Arc::new(TomlPreferenceRepository::new(&paths));

    let writer = PreferenceWriter::load(repository, Duration::from_secs(60)).await;
    assert_eq!(
        writer.get("codex", CapabilityKind::Model).await.as_deref(),
        Some("o3")
    );

    writer.record("codex", CapabilityKind::Mode, "auto").await;
    writer.flush().await.unwrap();

    let written = std::fs::read_to_string(paths.preferences_file()).unwrap();
    assert!(written.contains("version = \"1.1.0\""));
    let reopened = TomlPreferenceRepository::new(&paths).load().await.unwrap();
    assert_eq!(reopened.get("codex", CapabilityKind::Model), Some("o3"));
    assert_eq!(reopened.get("codex", CapabilityKind::Mode), Some("auto"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_corrupt_file_starts_empty() {
    let temp_dir = TempDir::new().unwrap();
    let paths = HelmPaths::at(temp_dir.path());
    std::fs::write(paths.preferences_file(), "version = [").unwrap();

    let writer = PreferenceWriter::load(
        Arc::new(TomlPreferenceRepository::new(&paths)),
        Duration::from_millis(10),
    )
    .await;

    assert!(writer.options().await.agents.is_empty());
}
