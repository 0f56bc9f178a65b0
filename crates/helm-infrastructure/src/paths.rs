//! Path resolution for Helm configuration files.
//!
//! ```text
//! ~/.config/helm/
//! ├── config.toml        # ConsoleConfig
//! ├── preferences.toml   # last-used options (versioned)
//! └── logs/
//!     └── helm.log.YYYY-MM-DD
//! ```

use helm_core::error::{HelmError, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "helm";

/// Resolved locations of every file the console persists.
///
/// `HelmPaths::resolve` uses the platform config directory; `HelmPaths::at`
/// pins everything under an explicit root, which is what tests use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmPaths {
    root: PathBuf,
}

impl HelmPaths {
    /// Resolves the platform config directory (e.g. `~/.config/helm`).
    ///
    /// # Errors
    ///
    /// Returns `HelmError::Config` when no config or home directory can be
    /// determined for the current user.
    pub fn resolve() -> Result<Self> {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .ok_or_else(|| HelmError::config("Cannot find home directory"))?;
        Ok(Self::at(base.join(APP_DIR)))
    }

    /// Uses `root` in place of the platform directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn preferences_file(&self) -> PathBuf {
        self.root.join("preferences.toml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Creates the root and logs directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.logs_dir()).map_err(|e| {
            HelmError::io(format!(
                "Failed to create directory '{}': {}",
                self.logs_dir().display(),
                e
            ))
        })
    }
}
