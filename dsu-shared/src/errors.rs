//! Error taxonomy for DSU installation.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the installer.
pub type DsuResult<T> = Result<T, DsuError>;

#[derive(Debug, Error)]
pub enum DsuError {
    /// A dynamic system image is already booted on this device.
    #[error("a dynamic system image is already running")]
    AlreadyRunning,

    /// A previous installation was never discarded.
    #[error("previous installation must be discarded first: {}", .0.display())]
    RequiresDiscard(PathBuf),

    /// The privileged create or write step failed for the named partition.
    #[error("failed to create partition: {0}")]
    PartitionCreation(String),

    /// Enabling the installed image failed.
    #[error("failed to enable dynamic system: {0}")]
    Activation(String),

    /// The run was stopped through its cancellation token.
    #[error("installation cancelled")]
    Cancelled,

    #[error("stream error: {0}")]
    Stream(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DsuError {
    /// Whether this error is the cooperative cancellation signal rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DsuError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_creation_message_names_partition() {
        let err = DsuError::PartitionCreation("userdata".into());
        assert_eq!(err.to_string(), "failed to create partition: userdata");
    }

    #[test]
    fn test_cancelled_is_not_a_failure_kind() {
        assert!(DsuError::Cancelled.is_cancelled());
        assert!(!DsuError::AlreadyRunning.is_cancelled());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DsuError = io.into();
        assert!(matches!(err, DsuError::Io(_)));
    }
}
