//! TOML-based PreferenceRepository implementation.
//!
//! The document lives at `~/.config/helm/preferences.toml` in the flat
//! versioned layout:
//!
//! ```toml
//! version = "1.1.0"
//!
//! [agents.codex]
//! model = "gpt-5"
//! reasoning_effort = "high"
//! ```

use async_trait::async_trait;
use helm_core::error::{HelmError, Result};
use helm_core::preference::{LastUsedOptions, PreferenceRepository};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dto::{PREFERENCES_ENTITY, create_preferences_migrator};
use crate::paths::HelmPaths;
use crate::storage::AtomicTomlFile;

/// Stores the last-used option record in a single TOML file.
///
/// File I/O runs on the blocking pool; every save goes through
/// `AtomicTomlFile::update` so concurrent writers never interleave.
pub struct TomlPreferenceRepository {
    path: Arc<PathBuf>,
}

impl TomlPreferenceRepository {
    pub fn new(paths: &HelmPaths) -> Self {
        Self::at(paths.preferences_file())
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Arc::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_sync(path: &Path) -> Result<LastUsedOptions> {
        let Some(document) = AtomicTomlFile::<toml::Value>::new(path.to_path_buf()).load()? else {
            return Ok(LastUsedOptions::new());
        };

        let migrator = create_preferences_migrator()?;
        migrator
            .load_flat_from(PREFERENCES_ENTITY, document)
            .map_err(|e| {
                HelmError::migration(format!(
                    "Failed to migrate preferences from '{}': {}",
                    path.display(),
                    e
                ))
            })
    }

    fn save_sync(path: &Path, options: LastUsedOptions) -> Result<()> {
        let migrator = create_preferences_migrator()?;
        let json_str = migrator.save_domain_flat(PREFERENCES_ENTITY, options)?;
        let json_value: serde_json::Value = serde_json::from_str(&json_str)?;
        let document = json_to_toml(&json_value)?;

        AtomicTomlFile::<toml::Value>::new(path.to_path_buf()).update(
            toml::Value::Table(toml::map::Map::new()),
            |current| {
                *current = document;
                Ok(())
            },
        )?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceRepository for TomlPreferenceRepository {
    async fn load(&self) -> Result<LastUsedOptions> {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || Self::load_sync(&path))
            .await
            .map_err(|e| HelmError::internal(format!("Failed to spawn blocking task: {}", e)))?
    }

    async fn save(&self, options: &LastUsedOptions) -> Result<()> {
        let path = Arc::clone(&self.path);
        let options = options.clone();
        tokio::task::spawn_blocking(move || Self::save_sync(&path, options))
            .await
            .map_err(|e| HelmError::internal(format!("Failed to spawn blocking task: {}", e)))?
    }
}

/// Converts the migrator's JSON output into a TOML document.
///
/// TOML has no null; null members are dropped.
fn json_to_toml(json: &serde_json::Value) -> Result<toml::Value> {
    let serialization = |message: String| HelmError::Serialization {
        format: "TOML".to_string(),
        message,
    };

    match json {
        serde_json::Value::Null => Err(serialization("null has no TOML form".to_string())),
        serde_json::Value::Bool(b) => Ok(toml::Value::Boolean(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(toml::Value::Integer)
            .or_else(|| n.as_f64().map(toml::Value::Float))
            .ok_or_else(|| serialization(format!("Unsupported JSON number: {}", n))),
        serde_json::Value::String(s) => Ok(toml::Value::String(s.clone())),
        serde_json::Value::Array(items) => items
            .iter()
            .map(json_to_toml)
            .collect::<Result<Vec<_>>>()
            .map(toml::Value::Array),
        serde_json::Value::Object(members) => {
            let mut table = toml::map::Map::new();
            for (key, value) in members.iter().filter(|(_, v)| !v.is_null()) {
                table.insert(key.clone(), json_to_toml(value)?);
            }
            Ok(toml::Value::Table(table))
        }
    }
}
