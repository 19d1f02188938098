//! Errors raised while reading a browser's history store.
//!
//! None of these are fatal to a run: the reader logs them and the affected
//! source contributes no entries.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No history store was found for the source.
    #[error("history store not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The store exists but could not be copied aside.
    #[error("failed to snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be opened as a SQLite database.
    #[error("failed to open snapshot of {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    /// The history query itself failed (unexpected schema, corrupt file).
    #[error("history query failed: {0}")]
    Query(#[from] sqlx::Error),
}
