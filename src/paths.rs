//! Content-addressed shard path construction.
//!
//! Committed files live at `<root>/<hex[0..2]>/<hex[2..4]>/<hex><ext>`, with
//! thumbnails in a parallel tree under their own root. Two hex levels keep any
//! single directory to roughly 1/256 of the distinct digest prefixes, and
//! digest-derived paths make the store content-deduplicating with no separate
//! index.

use std::path::{Path, PathBuf};

/// Extension used for every derived thumbnail, regardless of source format.
pub const THUMBNAIL_EXT: &str = ".jpg";

/// Build the canonical path for committed content.
///
/// `ext` must be either empty or start with a dot (see [`file_extension`]).
pub fn content_path(root: &Path, digest_hex: &str, ext: &str) -> PathBuf {
    shard_dir(root, digest_hex).join(format!("{digest_hex}{ext}"))
}

/// Build the thumbnail path for a digest. Thumbnails are always JPEG.
pub fn thumbnail_path(root: &Path, digest_hex: &str) -> PathBuf {
    shard_dir(root, digest_hex).join(format!("{digest_hex}{THUMBNAIL_EXT}"))
}

/// The two-level shard directory a digest maps into.
pub fn shard_dir(root: &Path, digest_hex: &str) -> PathBuf {
    debug_assert!(
        digest_hex.len() >= 4 && digest_hex.is_ascii(),
        "digest must be at least 4 hex chars"
    );
    root.join(&digest_hex[0..2]).join(&digest_hex[2..4])
}

/// Recover the lower-cased extension (with leading dot) from an uploaded
/// filename. A name with no extension yields the empty string. No content
/// sniffing happens here or anywhere else; the declared media kind is trusted.
pub fn file_extension(filename: &str) -> String {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{}", ext.to_lowercase()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_path_shape() {
        let digest = "ab12cd34ef56ab12cd34ef56ab12cd34ef56ab12cd34ef56ab12cd34ef56ab12";
        let path = content_path(Path::new("content"), digest, ".png");
        assert_eq!(
            path,
            Path::new("content").join("ab").join("12").join(format!("{digest}.png"))
        );
    }

    #[test]
    fn thumbnail_path_uses_fixed_extension() {
        let digest = "ff00aa11ff00aa11ff00aa11ff00aa11ff00aa11ff00aa11ff00aa11ff00aa11";
        let path = thumbnail_path(Path::new("thumbnail"), digest);
        assert_eq!(
            path,
            Path::new("thumbnail").join("ff").join("00").join(format!("{digest}.jpg"))
        );
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("photo.PNG"), ".png");
        assert_eq!(file_extension("clip.Mp4"), ".mp4");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
    }

    #[test]
    fn missing_extension_is_empty() {
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension(""), "");
    }
}
