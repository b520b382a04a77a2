//! Durable placement of staged files at their content-addressed paths.
//!
//! The final rename is the serialization point for concurrent uploads of the
//! same content: no application-level locking exists, and a destination that
//! already holds the digest's bytes turns the commit into a dedup no-op.

use std::path::Path;

use thiserror::Error;
use tokio::fs;

use crate::stage::StagedFile;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Failed to create shard directories for {path}: {source}")]
    CreateDirs {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to move staged file into {path}: {source}")]
    Rename {
        path: String,
        source: std::io::Error,
    },
}

/// How a commit concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The staged file was renamed into place.
    Committed,
    /// Identical content was already present at the destination; the staged
    /// file was discarded and the existing bytes were left untouched.
    Deduplicated,
}

/// Move a staged file to its final content-addressed path.
///
/// Shard directory creation is idempotent. A pre-existing destination is a
/// dedup success: digests collide only on identical input, so the bytes on
/// disk are already the bytes we staged. Two racing commits of the same
/// digest may both reach the rename; that is harmless because the rename is
/// atomic and both sources are byte-identical.
///
/// On `Ok`, a readable file exists at `dest` and the staged temp file is
/// gone from the staging directory.
pub async fn commit(mut staged: StagedFile, dest: &Path) -> Result<CommitOutcome, CommitError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await.map_err(|e| CommitError::CreateDirs {
            path: dest.display().to_string(),
            source: e,
        })?;
    }

    if fs::try_exists(dest).await.unwrap_or(false) {
        tracing::debug!(path = %dest.display(), "Content already committed, deduplicating");
        return Ok(CommitOutcome::Deduplicated);
    }

    fs::rename(staged.path(), dest)
        .await
        .map_err(|e| CommitError::Rename {
            path: dest.display().to_string(),
            source: e,
        })?;
    staged.promote();

    tracing::debug!(path = %dest.display(), "Committed content file");
    Ok(CommitOutcome::Committed)
}
