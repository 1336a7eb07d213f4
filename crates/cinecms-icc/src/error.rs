//! ICC error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for ICC operations.
pub type IccResult<T> = Result<T, IccError>;

/// Errors that can occur during colour-management operations.
#[derive(Debug, Error)]
pub enum IccError {
    /// Profile bytes could not be read or parsed.
    #[error("failed to open profile: {0}")]
    ProfileOpen(String),

    /// Operation on a profile the store does not know.
    #[error("profile not registered: {0}")]
    ProfileNotRegistered(String),

    /// The engine refused to build a transform.
    #[error("failed to build transform: {0}")]
    TransformBuild(String),

    /// The profile needs more colour channels than the buffer supplies.
    #[error("profile {color_space} needs {needed} colour channels, buffer has {available}")]
    ChannelMismatch {
        /// Profile colour space.
        color_space: String,
        /// Colour channels the profile needs.
        needed: usize,
        /// Channels the buffer tag supplies.
        available: usize,
    },

    /// Device link export or import failed.
    #[error("device link {path}: {reason}")]
    Serialization {
        /// Device link file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The transform handle is evicted.
    #[error("transform {0} is not resident")]
    NotResident(String),

    /// Empty or undersized pixel buffer.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    /// Buffer precision differs from the transform's tag.
    #[error("precision mismatch: transform expects {expected}, buffer is {actual}")]
    PrecisionMismatch {
        /// Precision of the transform tag.
        expected: cinecms_core::Precision,
        /// Precision of the buffer.
        actual: cinecms_core::Precision,
    },

    /// Transform requested over no profiles.
    #[error("profile chain is empty")]
    EmptyChain,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Pixel buffer error.
    #[error(transparent)]
    Core(#[from] cinecms_core::Error),
}

impl IccError {
    /// Creates an [`IccError::Serialization`] error.
    pub fn serialization(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Serialization {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
