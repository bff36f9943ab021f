//! Error types for ares-tm

use crate::services::FranchiseNotConfiguredError;
use crate::types::{StoreError, TagError};
use std::path::PathBuf;
use thiserror::Error;

/// Track manager error type
#[derive(Debug, Error)]
pub enum TrackManagerError {
    /// Non-MP3 input; raised before any file is read
    #[error("Invalid file type for {}: only MP3 files are supported", path.display())]
    InvalidFileType { path: PathBuf },

    #[error(transparent)]
    FranchiseNotConfigured(#[from] FranchiseNotConfiguredError),

    #[error("Customization store error: {0}")]
    Store(#[from] StoreError),

    #[error("Tag error for {}: {}", path.display(), source)]
    Tag {
        path: PathBuf,
        #[source]
        source: TagError,
    },

    #[error("Track not loaded: {}", .0.display())]
    TrackNotLoaded(PathBuf),

    /// Background task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for TrackManagerError {
    fn from(e: tokio::task::JoinError) -> Self {
        TrackManagerError::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackManagerError>;
