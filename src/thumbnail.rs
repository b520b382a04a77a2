//! Thumbnail derivation, polymorphic over media kind.
//!
//! Image content is resized in-process with a linear filter to a fixed target
//! width. Video content goes through an external ffmpeg invocation that
//! extracts a single frame at a fixed offset, after which the frame takes the
//! image path. Audio and book posts have no thumbnail. A missing preview is
//! unacceptable for image and video posts, so every error here is fatal to
//! the ingestion and unwinds it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use image::imageops::FilterType;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::paths;
use crate::store::models::{MediaKind, ThumbnailStrategy};

/// Target thumbnail width; height follows the source aspect ratio.
pub const THUMB_WIDTH: u32 = 400;

/// Seek offset into a video for the extracted frame, in seconds.
pub const FRAME_SEEK_SECS: u32 = 5;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Frame extraction failed (exit {status}): {stderr}")]
    FrameExtraction { status: i32, stderr: String },
    #[error("Frame extraction timed out after {0:?}")]
    Timeout(Duration),
    #[error("Image task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Derivation cancelled")]
    Cancelled,
}

/// Derives thumbnails into the thumbnail shard tree.
#[derive(Clone)]
pub struct Thumbnailer {
    thumbnail_root: PathBuf,
    staging_dir: PathBuf,
    ffmpeg_path: String,
    ffmpeg_timeout: Duration,
}

impl Thumbnailer {
    pub fn new(
        thumbnail_root: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
        ffmpeg_path: String,
        ffmpeg_timeout: Duration,
    ) -> Self {
        Self {
            thumbnail_root: thumbnail_root.into(),
            staging_dir: staging_dir.into(),
            ffmpeg_path,
            ffmpeg_timeout,
        }
    }

    /// Derive a thumbnail for committed content.
    ///
    /// Returns the thumbnail path, or `None` for kinds that have no
    /// thumbnail strategy. `None` is the expected outcome for audio and
    /// book posts, not a failure.
    pub async fn derive(
        &self,
        kind: MediaKind,
        source: &Path,
        digest_hex: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>, ThumbnailError> {
        match kind.thumbnail_strategy() {
            None => Ok(None),
            Some(ThumbnailStrategy::Resize) => {
                self.resize_image(source, digest_hex).await.map(Some)
            }
            Some(ThumbnailStrategy::ExtractFrame) => self
                .extract_video_frame(source, digest_hex, cancel)
                .await
                .map(Some),
        }
    }

    /// Decode, resize proportionally to [`THUMB_WIDTH`], encode as JPEG into
    /// the thumbnail shard path. The pixel work runs off the async runtime.
    async fn resize_image(
        &self,
        source: &Path,
        digest_hex: &str,
    ) -> Result<PathBuf, ThumbnailError> {
        let dest = paths::thumbnail_path(&self.thumbnail_root, digest_hex);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let source = source.to_path_buf();
        let out = dest.clone();
        tokio::task::spawn_blocking(move || -> Result<(), ThumbnailError> {
            let img = image::open(&source)?;
            let height = scaled_height(img.width(), img.height());
            let thumb = img.resize_exact(THUMB_WIDTH, height, FilterType::Triangle);
            // JPEG has no alpha channel
            thumb.to_rgb8().save(&out)?;
            Ok(())
        })
        .await??;

        tracing::debug!(path = %dest.display(), "Wrote thumbnail");
        Ok(dest)
    }

    /// Extract one frame at [`FRAME_SEEK_SECS`] with ffmpeg, then run the
    /// image path over it. The extracted frame is removed whether or not the
    /// resize succeeded.
    async fn extract_video_frame(
        &self,
        source: &Path,
        digest_hex: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ThumbnailError> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let frame_path = self.staging_dir.join(format!("frame-{digest_hex}.jpg"));

        let result = match self.run_ffmpeg(source, &frame_path, cancel).await {
            Ok(()) => self.resize_image(&frame_path, digest_hex).await,
            Err(e) => Err(e),
        };

        if let Err(e) = tokio::fs::remove_file(&frame_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %frame_path.display(), error = %e, "Failed to remove extracted frame");
            }
        }

        result
    }

    /// Invoke ffmpeg to produce one frame. Timeout and cancellation kill the
    /// child process and are treated like a nonzero exit by the caller.
    async fn run_ffmpeg(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), ThumbnailError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-ss")
            .arg(FRAME_SEEK_SECS.to_string())
            .arg("-vframes")
            .arg("1")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ThumbnailError::Cancelled),
            res = tokio::time::timeout(self.ffmpeg_timeout, cmd.output()) => res,
        };

        let out = match waited {
            Ok(io_result) => io_result?,
            Err(_) => return Err(ThumbnailError::Timeout(self.ffmpeg_timeout)),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(ThumbnailError::FrameExtraction {
                status: out.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(())
    }
}

/// Proportional height for a [`THUMB_WIDTH`]-wide thumbnail, never zero.
fn scaled_height(width: u32, height: u32) -> u32 {
    let width = width.max(1) as u64;
    ((height as u64 * THUMB_WIDTH as u64) / width).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn test_thumbnailer(dir: &Path) -> Thumbnailer {
        Thumbnailer::new(
            dir.join("thumbnail"),
            dir.join("tmp"),
            "ffmpeg".to_string(),
            Duration::from_secs(5),
        )
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = ImageBuffer::from_pixel(width, height, Rgb::<u8>([120, 40, 200]));
        img.save(path).unwrap();
    }

    #[tokio::test]
    async fn image_thumbnail_is_resized_to_target_width() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.png");
        write_png(&source, 800, 600);

        let digest = "aa".repeat(32);
        let thumbnailer = test_thumbnailer(dir.path());
        let cancel = CancellationToken::new();
        let thumb = thumbnailer
            .derive(MediaKind::Image, &source, &digest, &cancel)
            .await
            .unwrap()
            .expect("image kind must produce a thumbnail");

        assert_eq!(thumb, paths::thumbnail_path(&dir.path().join("thumbnail"), &digest));
        let written = image::open(&thumb).unwrap();
        assert_eq!(written.width(), THUMB_WIDTH);
        assert_eq!(written.height(), 300);
    }

    #[tokio::test]
    async fn no_thumbnail_kinds_are_noops() {
        let dir = tempfile::tempdir().unwrap();
        let thumbnailer = test_thumbnailer(dir.path());
        let cancel = CancellationToken::new();
        let digest = "bb".repeat(32);

        let audio = thumbnailer
            .derive(MediaKind::Audio, Path::new("/nonexistent"), &digest, &cancel)
            .await
            .unwrap();
        let book = thumbnailer
            .derive(MediaKind::Book, Path::new("/nonexistent"), &digest, &cancel)
            .await
            .unwrap();

        assert!(audio.is_none());
        assert!(book.is_none());
        assert!(!dir.path().join("thumbnail").exists());
    }

    #[tokio::test]
    async fn undecodable_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bogus.png");
        std::fs::write(&source, b"not an image").unwrap();

        let thumbnailer = test_thumbnailer(dir.path());
        let cancel = CancellationToken::new();
        let result = thumbnailer
            .derive(MediaKind::Image, &source, &"cc".repeat(32), &cancel)
            .await;

        assert!(matches!(result, Err(ThumbnailError::Image(_))));
    }

    #[tokio::test]
    async fn failed_frame_extraction_reports_exit() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, b"fake video").unwrap();

        // `false` ignores its arguments and exits 1
        let thumbnailer = Thumbnailer::new(
            dir.path().join("thumbnail"),
            dir.path().join("tmp"),
            "false".to_string(),
            Duration::from_secs(5),
        );
        let cancel = CancellationToken::new();
        let result = thumbnailer
            .derive(MediaKind::Video, &source, &"dd".repeat(32), &cancel)
            .await;

        assert!(matches!(
            result,
            Err(ThumbnailError::FrameExtraction { .. })
        ));
        // No stray extracted frame left behind
        assert!(std::fs::read_dir(dir.path().join("tmp"))
            .map(|entries| entries.count() == 0)
            .unwrap_or(true));
    }

    #[test]
    fn scaled_height_preserves_aspect() {
        assert_eq!(scaled_height(800, 600), 300);
        assert_eq!(scaled_height(400, 400), 400);
        assert_eq!(scaled_height(1000, 10), 4);
        assert_eq!(scaled_height(4000, 1), 1);
    }
}
