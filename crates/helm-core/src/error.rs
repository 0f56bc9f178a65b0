//! Error types for the Helm console core.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the entire Helm console.
///
/// Variants are typed so call sites can decide between surfacing a notice and
/// logging a diagnostic without parsing messages.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum HelmError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A backend invoke was rejected or the transport failed
    #[error("Transport error during '{command}': {message}")]
    Transport { command: String, message: String },

    /// A push payload could not be decoded into a typed event
    #[error("Malformed '{event}' payload: {message}")]
    Decode { event: String, message: String },

    /// A session with this id is already registered
    #[error("Session '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Downloads are serialized; another job holds the slot
    #[error("A download is already in progress for '{0}'")]
    DownloadInProgress(String),

    /// Cancel requested while nothing is downloading
    #[error("No download is in progress")]
    NoActiveDownload,

    /// Activation requires a downloaded artifact
    #[error("Artifact '{0}' is not downloaded")]
    ArtifactNotDownloaded(String),

    /// Artifact is already on disk
    #[error("Artifact '{0}' is already downloaded")]
    ArtifactAlreadyDownloaded(String),

    /// The active artifact cannot be deleted
    #[error("Artifact '{0}' is active and cannot be deleted")]
    ArtifactActive(String),

    /// The artifact is the target of the running download
    #[error("Artifact '{0}' is being downloaded")]
    ArtifactBusy(String),

    /// Recording needs an active artifact
    #[error("No active model is available for recording")]
    NoActiveArtifact,

    /// The recording state machine rejected the operation
    #[error("Cannot {operation} while recording is {state}")]
    InvalidRecordingState {
        operation: &'static str,
        state: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HelmError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Transport error for the given backend command
    pub fn transport(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a Decode error for the given push event name
    pub fn decode(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Creates an InvalidRecordingState error
    pub fn invalid_recording_state(operation: &'static str, state: impl ToString) -> Self {
        Self::InvalidRecordingState {
            operation,
            state: state.to_string(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a Migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a transport failure
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Check if this error was raised by a local precondition rather than the backend.
    ///
    /// Precondition failures never reach the channel, so there is nothing to
    /// roll back when they occur.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered(_)
                | Self::DownloadInProgress(_)
                | Self::NoActiveDownload
                | Self::ArtifactNotDownloaded(_)
                | Self::ArtifactAlreadyDownloaded(_)
                | Self::ArtifactActive(_)
                | Self::ArtifactBusy(_)
                | Self::NoActiveArtifact
                | Self::InvalidRecordingState { .. }
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for HelmError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for HelmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for HelmError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for HelmError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<version_migrate::MigrationError> for HelmError {
    fn from(err: version_migrate::MigrationError) -> Self {
        Self::Migration(err.to_string())
    }
}

/// Conversion from anyhow::Error (used at composition edges)
impl From<anyhow::Error> for HelmError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, HelmError>`.
pub type Result<T> = std::result::Result<T, HelmError>;
