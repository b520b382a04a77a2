//! The relational-store seam.
//!
//! The ingestion pipeline only needs these operations and their error
//! behavior; it defines no schema. The crate ships an embedded redb-backed
//! implementation ([`Database`](super::Database)), but any relational engine
//! can stand behind this trait.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{NewPost, PostRecord};

/// Post store errors. Lookups for missing posts are reported distinctly from
/// backend failures so callers can map them to a 404-equivalent.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Post not found: {0}")]
    NotFound(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a post with its final filename and extension already assigned.
    /// Returns the new post's identifier.
    async fn insert_post(&self, post: NewPost) -> Result<String, StoreError>;

    /// Fetch a post by id. Missing posts are `StoreError::NotFound`.
    async fn get_post(&self, id: &str) -> Result<PostRecord, StoreError>;

    /// Delete a post by id. Missing posts are `StoreError::NotFound`.
    async fn delete_post(&self, id: &str) -> Result<(), StoreError>;

    /// All posts, most useful to browsing layers and tests.
    async fn list_posts(&self) -> Result<Vec<PostRecord>, StoreError>;

    /// Posts owned by one user, via the owner index.
    async fn list_owner_posts(&self, owner_id: &str) -> Result<Vec<PostRecord>, StoreError>;
}
