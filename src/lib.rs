//! media-ingest - Content-addressable ingestion and storage pipeline for media uploads
//!
//! This crate accepts an uploaded byte stream and:
//! - stages it to a temp file while computing its SHA-256 digest in one pass
//! - commits it to a two-level digest-sharded content tree via atomic rename,
//!   deduplicating when identical content was already committed
//! - derives a thumbnail (in-process image resize, or ffmpeg frame extraction
//!   for video; audio and book posts have none)
//! - keeps the post record and on-disk artifacts consistent on every exit
//!   path by unwinding earlier steps when a later one fails
//!
//! The relational side lives behind the [`store::PostStore`] trait; an
//! embedded redb implementation ships with the crate. HTTP transport, auth,
//! and tag/artist modeling are deliberately out of scope.

pub mod commit;
pub mod config;
pub mod ingest;
pub mod paths;
pub mod stage;
pub mod store;
pub mod thumbnail;

pub use config::Config;
pub use ingest::{IngestError, Ingestor, UploadRequest};
pub use stage::ContentDigest;
pub use store::{MediaKind, PostRecord, PostStore};
