use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of media kinds a post can declare.
///
/// Each kind carries exactly the thumbnail behavior it needs; the deriver
/// matches on this exhaustively, so adding a kind is a compile-time event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Book,
}

/// How a thumbnail is produced for a media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailStrategy {
    /// Decode and resize the content itself.
    Resize,
    /// Extract a frame with an external process, then resize that frame.
    ExtractFrame,
}

impl MediaKind {
    /// The thumbnail strategy for this kind, if it has one. Audio and book
    /// posts have no viewable preview and that is expected, not an error.
    pub fn thumbnail_strategy(self) -> Option<ThumbnailStrategy> {
        match self {
            MediaKind::Image => Some(ThumbnailStrategy::Resize),
            MediaKind::Video => Some(ThumbnailStrategy::ExtractFrame),
            MediaKind::Audio | MediaKind::Book => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Book => "book",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared media kind outside the known enum.
#[derive(Debug, Clone, Error)]
#[error("Invalid media kind: {0}")]
pub struct InvalidMediaKind(pub String);

impl FromStr for MediaKind {
    type Err = InvalidMediaKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            "book" => Ok(MediaKind::Book),
            other => Err(InvalidMediaKind(other.to_string())),
        }
    }
}

/// A post as stored behind the [`PostStore`](super::PostStore) seam.
///
/// `filename` is the content digest's hex form; together with `file_ext` it
/// locates both the content file and the thumbnail by recomputed shard path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub media_kind: MediaKind,
    pub filename: String,
    pub file_ext: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a tentative post insert. The final filename and extension are
/// assigned before the insert, which is the first externally visible commit
/// point of an ingestion.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub media_kind: MediaKind,
    pub filename: String,
    pub file_ext: String,
    pub owner_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_from_str() {
        assert_eq!("image".parse::<MediaKind>().unwrap(), MediaKind::Image);
        assert_eq!("Video".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert_eq!("AUDIO".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert_eq!("book".parse::<MediaKind>().unwrap(), MediaKind::Book);
        assert!("gif".parse::<MediaKind>().is_err());
    }

    #[test]
    fn thumbnail_strategies() {
        assert_eq!(
            MediaKind::Image.thumbnail_strategy(),
            Some(ThumbnailStrategy::Resize)
        );
        assert_eq!(
            MediaKind::Video.thumbnail_strategy(),
            Some(ThumbnailStrategy::ExtractFrame)
        );
        assert_eq!(MediaKind::Audio.thumbnail_strategy(), None);
        assert_eq!(MediaKind::Book.thumbnail_strategy(), None);
    }
}
