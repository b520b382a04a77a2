//! Ingestion orchestration.
//!
//! One ingestion touches three resources that must end up consistent on
//! every exit path: the staged temp file, the committed content file, and
//! the post record. Each successful step pushes a compensating action onto
//! an unwind list local to the call; any later failure drains the list in
//! reverse, so no step's cleanup can be forgotten as the pipeline grows.
//! Cleanup failures are logged and swallowed — the user-visible outcome is
//! the primary failure, and an orphaned file beats reporting
//! success-then-failure inconsistently.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::commit::{commit, CommitError};
use crate::config::Config;
use crate::paths;
use crate::stage::{stage, StageError};
use crate::store::models::{InvalidMediaKind, MediaKind, NewPost, PostRecord};
use crate::store::traits::{PostStore, StoreError};
use crate::thumbnail::{Thumbnailer, ThumbnailError};

#[derive(Debug, Error)]
pub enum IngestError {
    /// Local I/O failure while staging the upload; nothing was persisted.
    #[error("Staging failed: {0}")]
    Staging(#[source] StageError),
    /// The rename to the final content path failed for a reason other than
    /// "already exists"; the tentative post record was deleted.
    #[error("Commit failed: {0}")]
    Commit(#[from] CommitError),
    /// The thumbnail step failed; both the post record and the content file
    /// were removed.
    #[error("Thumbnail derivation failed: {0}")]
    Derivation(#[source] ThumbnailError),
    #[error(transparent)]
    InvalidMediaKind(#[from] InvalidMediaKind),
    #[error("Post not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("Ingestion cancelled")]
    Cancelled,
}

impl From<StageError> for IngestError {
    fn from(e: StageError) -> Self {
        match e {
            StageError::Cancelled => IngestError::Cancelled,
            other => IngestError::Staging(other),
        }
    }
}

impl From<ThumbnailError> for IngestError {
    fn from(e: ThumbnailError) -> Self {
        match e {
            ThumbnailError::Cancelled => IngestError::Cancelled,
            other => IngestError::Derivation(other),
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => IngestError::NotFound(id),
            other => IngestError::Store(other),
        }
    }
}

/// One upload, as handed over by the transport layer. The original filename
/// is used only to recover the extension; the declared kind is trusted.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub title: String,
    pub media_kind: MediaKind,
    pub original_filename: String,
}

/// Reversal of one already-performed side effect.
enum Compensation {
    DeletePostRecord(String),
    RemoveFile(PathBuf),
}

/// Call-local unwind list, drained in reverse push order on failure.
#[derive(Default)]
struct Unwind {
    actions: Vec<Compensation>,
}

impl Unwind {
    fn push(&mut self, action: Compensation) {
        self.actions.push(action);
    }

    async fn run(&mut self, store: &dyn PostStore) {
        while let Some(action) = self.actions.pop() {
            match action {
                Compensation::DeletePostRecord(id) => {
                    if let Err(e) = store.delete_post(&id).await {
                        tracing::warn!(post_id = %id, error = %e, "Failed to delete post record during unwind");
                    }
                }
                Compensation::RemoveFile(path) => {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file during unwind");
                        }
                    }
                }
            }
        }
    }
}

/// Sequences staging, dedup commit, record insertion, and thumbnail
/// derivation for one upload, with compensation on any downstream failure.
///
/// All collaborators are injected: the post store behind its trait, the
/// filesystem roots from configuration. Concurrent ingestions need no
/// coordination here; the content-path rename is the serialization point.
pub struct Ingestor {
    store: Arc<dyn PostStore>,
    content_root: PathBuf,
    thumbnail_root: PathBuf,
    staging_dir: PathBuf,
    thumbnailer: Thumbnailer,
    max_upload_size: u64,
}

impl Ingestor {
    pub fn new(config: &Config, store: Arc<dyn PostStore>) -> Self {
        let thumbnailer = Thumbnailer::new(
            &config.storage.thumbnail_root,
            &config.storage.staging_dir,
            config.ffmpeg.path.clone(),
            config.ffmpeg.timeout(),
        );
        Self {
            store,
            content_root: PathBuf::from(&config.storage.content_root),
            thumbnail_root: PathBuf::from(&config.storage.thumbnail_root),
            staging_dir: PathBuf::from(&config.storage.staging_dir),
            thumbnailer,
            max_upload_size: config.max_upload_size,
        }
    }

    /// Ingest one upload. Returns the new post's id.
    ///
    /// The only successful exit is after the thumbnail was derived or was
    /// correctly skipped for kinds without one; no partial state counts as
    /// success.
    pub async fn ingest<R>(
        &self,
        upload: UploadRequest,
        content: R,
        owner_id: &str,
    ) -> Result<String, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.ingest_with_cancel(upload, content, owner_id, &CancellationToken::new())
            .await
    }

    /// [`ingest`](Self::ingest) with a cancellation token threaded through
    /// the stream copy and the frame-extraction subprocess. Cancellation
    /// compensates exactly like any other failure at the same step.
    pub async fn ingest_with_cancel<R>(
        &self,
        upload: UploadRequest,
        content: R,
        owner_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut unwind = Unwind::default();
        match self
            .run_pipeline(upload, content, owner_id, cancel, &mut unwind)
            .await
        {
            Ok(post_id) => Ok(post_id),
            Err(e) => {
                unwind.run(self.store.as_ref()).await;
                Err(e)
            }
        }
    }

    async fn run_pipeline<R>(
        &self,
        upload: UploadRequest,
        content: R,
        owner_id: &str,
        cancel: &CancellationToken,
        unwind: &mut Unwind,
    ) -> Result<String, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        // Stage and hash in one pass; nothing is persisted on failure here.
        let (staged, digest) = stage(&self.staging_dir, content, self.max_upload_size, cancel).await?;
        let digest_hex = digest.to_hex();

        let ext = paths::file_extension(&upload.original_filename);
        let dest = paths::content_path(&self.content_root, &digest_hex, &ext);

        // Tentative record insert: the first externally visible commit point.
        let post_id = self
            .store
            .insert_post(NewPost {
                title: upload.title,
                media_kind: upload.media_kind,
                filename: digest_hex.clone(),
                file_ext: ext,
                owner_id: owner_id.to_string(),
            })
            .await?;
        unwind.push(Compensation::DeletePostRecord(post_id.clone()));

        let outcome = commit(staged, &dest).await?;
        unwind.push(Compensation::RemoveFile(dest.clone()));

        let thumbnail = self
            .thumbnailer
            .derive(upload.media_kind, &dest, &digest_hex, cancel)
            .await?;

        tracing::info!(
            post_id = %post_id,
            digest = %digest_hex,
            outcome = ?outcome,
            thumbnail = thumbnail.is_some(),
            "Ingested upload"
        );
        Ok(post_id)
    }

    /// Fetch a post by id.
    pub async fn get_post(&self, post_id: &str) -> Result<PostRecord, IngestError> {
        Ok(self.store.get_post(post_id).await?)
    }

    /// Delete a post: the relational delete is the authoritative,
    /// user-visible action; artifact removal afterwards is best-effort, with
    /// failures logged rather than escalated.
    pub async fn delete_post(&self, post_id: &str) -> Result<(), IngestError> {
        let post = self.store.get_post(post_id).await?;
        self.store.delete_post(post_id).await?;

        let content = paths::content_path(&self.content_root, &post.filename, &post.file_ext);
        remove_artifact(&content, "content").await;

        if post.media_kind.thumbnail_strategy().is_some() {
            let thumb = paths::thumbnail_path(&self.thumbnail_root, &post.filename);
            remove_artifact(&thumb, "thumbnail").await;
        }

        tracing::info!(post_id = %post_id, "Deleted post");
        Ok(())
    }
}

async fn remove_artifact(path: &std::path::Path, what: &str) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove {what} file during delete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Kind strings are parsed at the transport boundary; the failure joins
    // the same taxonomy as every other ingestion error.
    #[test]
    fn unknown_kind_maps_into_ingest_error() {
        let parse_err = "gif".parse::<MediaKind>().unwrap_err();
        let err = IngestError::from(parse_err);
        assert!(matches!(err, IngestError::InvalidMediaKind(_)));
        assert_eq!(err.to_string(), "Invalid media kind: gif");
    }
}
