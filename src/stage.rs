//! Upload staging: stream an incoming byte stream to a temporary file while
//! computing its SHA-256 digest in the same pass.
//!
//! The staging directory must live on the same filesystem as the content
//! root so the later commit is a metadata-only rename, never a cross-device
//! copy. Nothing here buffers the whole payload in memory.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

const COPY_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Upload exceeds maximum size of {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("Upload cancelled")]
    Cancelled,
}

/// SHA-256 digest of the exact bytes staged. Two uploads with identical bytes
/// always produce the same digest, independent of title, kind, or extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Lower-case hex form, used as the stable filename stem.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse the 64-char hex form back into a digest.
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let bytes = hex::decode(hex_str).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(ContentDigest(bytes))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A temporary file holding one staged upload.
///
/// Exclusively owned by a single ingestion. The file is unlinked when the
/// handle drops unless the committer promoted it to its final path.
pub struct StagedFile {
    path: PathBuf,
    promoted: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark the staged file as renamed away; drop will no longer unlink it.
    pub(crate) fn promote(&mut self) {
        self.promoted = true;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.promoted {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged file");
                }
            }
        }
    }
}

/// Copy `reader` to a temp file under `staging_dir`, hashing as it goes.
///
/// The digest reflects exactly the bytes written: no truncation, no charset
/// conversion. `max_size` is a backstop behind the HTTP boundary's own body
/// cap. Cancellation is observed between chunks; a partially written temp
/// file is cleaned up by the returned-or-dropped [`StagedFile`] either way.
pub async fn stage<R>(
    staging_dir: &Path,
    mut reader: R,
    max_size: u64,
    cancel: &CancellationToken,
) -> Result<(StagedFile, ContentDigest), StageError>
where
    R: AsyncRead + Unpin,
{
    fs::create_dir_all(staging_dir).await?;

    let path = staging_dir.join(format!("upload-{}.part", uuid::Uuid::new_v4()));
    let mut file = fs::File::create(&path).await?;
    // Constructed before the first write so early failures still unlink it.
    let staged = StagedFile {
        path,
        promoted: false,
    };

    let mut hasher = Sha256::new();
    let mut buf = BytesMut::with_capacity(COPY_BUF_SIZE);
    let mut written: u64 = 0;

    loop {
        buf.clear();
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StageError::Cancelled),
            read = reader.read_buf(&mut buf) => read?,
        };
        if n == 0 {
            break;
        }

        written += n as u64;
        if written > max_size {
            return Err(StageError::TooLarge { limit: max_size });
        }

        hasher.update(&buf);
        file.write_all(&buf).await?;
    }

    file.sync_all().await?;
    drop(file);

    let digest = ContentDigest(hasher.finalize().into());
    tracing::debug!(
        path = %staged.path.display(),
        size_bytes = written,
        digest = %digest,
        "Staged upload"
    );

    Ok((staged, digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn digest_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();

        let (a, digest_a) = stage(dir.path(), Cursor::new(b"hello world".to_vec()), 1024, &cancel)
            .await
            .unwrap();
        let (b, digest_b) = stage(dir.path(), Cursor::new(b"hello world".to_vec()), 1024, &cancel)
            .await
            .unwrap();

        assert_eq!(digest_a, digest_b);
        assert_ne!(a.path(), b.path());
        assert_eq!(
            std::fs::read(a.path()).unwrap(),
            std::fs::read(b.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn staged_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();

        let (staged, _) = stage(dir.path(), Cursor::new(b"bytes".to_vec()), 1024, &cancel)
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn oversized_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();

        let result = stage(dir.path(), Cursor::new(vec![0u8; 100]), 10, &cancel).await;
        assert!(matches!(result, Err(StageError::TooLarge { limit: 10 })));

        // Partial temp file must not survive
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn cancelled_before_copy() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = stage(dir.path(), Cursor::new(b"data".to_vec()), 1024, &cancel).await;
        assert!(matches!(result, Err(StageError::Cancelled)));

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn digest_hex_round_trip() {
        let digest = ContentDigest([0xab; 32]);
        let hex = digest.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ContentDigest::from_hex(&hex), Some(digest));
        assert_eq!(ContentDigest::from_hex("zz"), None);
    }
}
