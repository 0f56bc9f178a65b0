//! Console configuration loading.

use crate::paths::HelmPaths;
use crate::storage::AtomicTomlFile;
use helm_core::config::ConsoleConfig;
use helm_core::error::{HelmError, Result};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Loads `config.toml` once and serves the cached value afterwards.
///
/// A missing or blank file yields `ConsoleConfig::default()`; a file that sets
/// only some keys is completed with defaults. A file that fails to parse is an
/// error so a typo is never silently replaced by defaults.
#[derive(Clone)]
pub struct ConfigService {
    file: Arc<AtomicTomlFile<ConsoleConfig>>,
    cached: Arc<RwLock<Option<ConsoleConfig>>>,
}

impl ConfigService {
    pub fn new(paths: &HelmPaths) -> Self {
        Self::from_file(paths.config_file())
    }

    pub fn from_file(path: PathBuf) -> Self {
        Self {
            file: Arc::new(AtomicTomlFile::new(path)),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the configuration, reading the file on first use.
    ///
    /// # Errors
    ///
    /// Returns `HelmError::Config` when the file exists but cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<ConsoleConfig> {
        if let Some(config) = self.read_cache()?.as_ref() {
            return Ok(config.clone());
        }

        let config = match self.file.load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::info!(
                    "[ConfigService] No config at {}, using defaults",
                    self.file.path().display()
                );
                ConsoleConfig::default()
            }
            Err(e) => {
                tracing::error!("[ConfigService] {}", e);
                return Err(HelmError::config(e.to_string()));
            }
        };

        *self.write_cache()? = Some(config.clone());
        Ok(config)
    }

    /// Drops the cached value and reads the file again.
    pub fn reload(&self) -> Result<ConsoleConfig> {
        *self.write_cache()? = None;
        self.load()
    }

    /// Persists `config` and replaces the cached value.
    pub fn save(&self, config: &ConsoleConfig) -> Result<()> {
        self.file.save(config)?;
        *self.write_cache()? = Some(config.clone());
        Ok(())
    }

    fn read_cache(&self) -> Result<std::sync::RwLockReadGuard<'_, Option<ConsoleConfig>>> {
        self.cached
            .read()
            .map_err(|_| HelmError::internal("config cache lock poisoned"))
    }

    fn write_cache(&self) -> Result<std::sync::RwLockWriteGuard<'_, Option<ConsoleConfig>>> {
        self.cached
            .write()
            .map_err(|_| HelmError::internal("config cache lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(&HelmPaths::at(temp_dir.path()));

        assert_eq!(service.load().unwrap(), ConsoleConfig::default());
    }

    #[test]
    fn test_partial_file_is_completed_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HelmPaths::at(temp_dir.path());
        std::fs::write(
            paths.config_file(),
            "pending_ttl_ms = 1000\nrecording_tick_ms = 250\n",
        )
        .unwrap();

        let config = ConfigService::new(&paths).load().unwrap();

        assert_eq!(config.pending_ttl_ms, 1_000);
        assert_eq!(config.recording_tick_ms, 250);
        assert_eq!(config.stream_safety_net_ms, 300);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HelmPaths::at(temp_dir.path());
        std::fs::write(paths.config_file(), "pending_ttl_ms = \"soon\"\n").unwrap();

        let err = ConfigService::new(&paths).load().unwrap_err();

        assert!(matches!(err, HelmError::Config(_)));
    }

    #[test]
    fn test_value_is_cached_until_reload() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HelmPaths::at(temp_dir.path());
        let service = ConfigService::new(&paths);
        assert_eq!(service.load().unwrap().view_bus_capacity, 256);

        std::fs::write(paths.config_file(), "view_bus_capacity = 8\n").unwrap();
        assert_eq!(service.load().unwrap().view_bus_capacity, 256);
        assert_eq!(service.reload().unwrap().view_bus_capacity, 8);
    }

    #[test]
    fn test_save_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HelmPaths::at(temp_dir.path());
        let config = ConsoleConfig {
            preference_debounce_ms: 900,
            ..ConsoleConfig::default()
        };

        ConfigService::new(&paths).save(&config).unwrap();

        assert_eq!(ConfigService::new(&paths).load().unwrap(), config);
    }
}
