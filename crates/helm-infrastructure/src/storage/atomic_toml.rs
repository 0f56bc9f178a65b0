//! Crash-safe TOML documents.
//!
//! Writers go through a sibling temp file that is fsynced and renamed over the
//! target, so readers only ever observe the previous or the next document.

use helm_core::error::HelmError;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures of a single atomic TOML operation.
#[derive(Debug, Error)]
pub enum AtomicTomlError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Lock error on '{path}': {message}")]
    Lock { path: PathBuf, message: String },
}

impl AtomicTomlError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<AtomicTomlError> for HelmError {
    fn from(err: AtomicTomlError) -> Self {
        match err {
            AtomicTomlError::Io { .. } | AtomicTomlError::Lock { .. } => {
                HelmError::io(err.to_string())
            }
            AtomicTomlError::Parse { .. } | AtomicTomlError::Serialize(_) => {
                HelmError::Serialization {
                    format: "TOML".to_string(),
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Handle to one TOML document on disk.
///
/// - **Atomicity**: tmp file + rename
/// - **Durability**: fsync before rename
/// - **Isolation**: `update` holds an exclusive advisory lock (unix)
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: parsed document
    /// - `Ok(None)`: the file is missing or blank
    /// - `Err`: the file exists but could not be read or parsed
    pub fn load(&self) -> Result<Option<T>, AtomicTomlError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AtomicTomlError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        toml::from_str(&content)
            .map(Some)
            .map_err(|source| AtomicTomlError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Replaces the document.
    pub fn save(&self, data: &T) -> Result<(), AtomicTomlError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| AtomicTomlError::io(parent, e))?;
        }

        let toml_string = toml::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file =
            File::create(&tmp_path).map_err(|e| AtomicTomlError::io(&tmp_path, e))?;
        tmp_file
            .write_all(toml_string.as_bytes())
            .and_then(|_| tmp_file.sync_all())
            .map_err(|e| AtomicTomlError::io(&tmp_path, e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).map_err(|e| AtomicTomlError::io(&self.path, e))?;

        tracing::debug!(
            "[AtomicTomlFile] Wrote {} bytes to {}",
            toml_string.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read-modify-write under an exclusive lock.
    ///
    /// `default_value` seeds the document when the file does not exist yet.
    /// Nothing is written if `f` fails.
    pub fn update<F>(&self, default_value: T, f: F) -> Result<(), AtomicTomlError>
    where
        F: FnOnce(&mut T) -> Result<(), AtomicTomlError>,
    {
        let _lock = FileLock::acquire(&self.path)?;

        let mut data = self.load()?.unwrap_or(default_value);
        f(&mut data)?;
        self.save(&data)
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicTomlError> {
        let invalid = |message: &str| {
            AtomicTomlError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, message.to_string()),
            )
        };
        let parent = self
            .path
            .parent()
            .ok_or_else(|| invalid("path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| invalid("path has no file name"))?;

        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive lock on `<file>.lock`, released and removed on drop.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, AtomicTomlError> {
        let lock_path = path.with_extension("lock");

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| AtomicTomlError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| AtomicTomlError::io(&lock_path, e))?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive().map_err(|e| AtomicTomlError::Lock {
                path: lock_path.clone(),
                message: e.to_string(),
            })?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
