//! Error types for snapshot persistence and roster sources.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `CoreError`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the core crate.
///
/// Reading a snapshot never fails (missing or corrupt artifacts degrade to a
/// first run), so only the write side shows up here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The snapshot could not be written to disk.
    #[error("failed to write snapshot {}: {source}", path.display())]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A report artifact other than the snapshot could not be written.
    #[error("failed to write artifact {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot or delta could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The group selection handed to a roster source is unusable.
    #[error("invalid group selection: {0}")]
    InvalidSelection(String),

    /// A roster source failed in a way that aborts the run.
    #[error("roster fetch failed: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CoreError {
    /// Wraps a source-specific error as a fatal fetch failure.
    pub fn fetch<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Fetch(Box::new(err))
    }
}
