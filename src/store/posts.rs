use async_trait::async_trait;
use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{NewPost, PostRecord};
use super::tables::*;
use super::traits::{PostStore, StoreError};

impl Database {
    // ========================================================================
    // Post operations
    // ========================================================================

    /// Store a post record and update the owner index
    pub fn put_post(&self, post: &PostRecord) -> Result<(), DatabaseError> {
        debug_assert!(!post.id.is_empty(), "post id must not be empty");
        debug_assert!(!post.filename.is_empty(), "post filename must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(POSTS)?;
            let data = rmp_serde::to_vec_named(post)?;
            table.insert(post.id.as_str(), data.as_slice())?;

            // Maintain owner index
            let mut owner_table = write_txn.open_table(OWNER_POSTS)?;
            let mut post_ids: Vec<String> = owner_table
                .get(post.owner_id.as_str())?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();

            if !post_ids.contains(&post.id) {
                post_ids.push(post.id.clone());
                let index_data = rmp_serde::to_vec_named(&post_ids)?;
                owner_table.insert(post.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a post by its UUID
    pub fn get_post_record(&self, id: &str) -> Result<Option<PostRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(POSTS)?;

        match table.get(id)? {
            Some(data) => {
                let post: PostRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    /// Delete a post by its UUID and clean up the owner index
    pub fn delete_post_record(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        // Get the post for index cleanup. The guard returned by `get` borrows
        // the table, so it must be dropped before the table is.
        let owner_id: Option<String> = {
            let table = write_txn.open_table(POSTS)?;
            let owner_id = match table.get(id)? {
                Some(data) => {
                    let post: PostRecord = rmp_serde::from_slice(data.value())?;
                    Some(post.owner_id)
                }
                None => None,
            };
            owner_id
        };

        let deleted = match owner_id {
            Some(owner_id) => {
                {
                    let mut table = write_txn.open_table(POSTS)?;
                    table.remove(id)?;
                }
                // Remove from owner index
                let post_ids: Option<Vec<String>> = {
                    let owner_table = write_txn.open_table(OWNER_POSTS)?;
                    let ids = match owner_table.get(owner_id.as_str())? {
                        Some(data) => Some(rmp_serde::from_slice(data.value())?),
                        None => None,
                    };
                    ids
                };
                if let Some(mut ids) = post_ids {
                    ids.retain(|pid| pid != id);
                    let mut owner_table = write_txn.open_table(OWNER_POSTS)?;
                    if ids.is_empty() {
                        owner_table.remove(owner_id.as_str())?;
                    } else {
                        let new_data = rmp_serde::to_vec_named(&ids)?;
                        owner_table.insert(owner_id.as_str(), new_data.as_slice())?;
                    }
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// Get all posts
    pub fn get_all_posts(&self) -> Result<Vec<PostRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(POSTS)?;

        let mut posts = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let post: PostRecord = rmp_serde::from_slice(value.value())?;
            posts.push(post);
        }

        Ok(posts)
    }

    /// Get all posts for an owner, via the owner index
    pub fn get_posts_by_owner(&self, owner_id: &str) -> Result<Vec<PostRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_POSTS)?;
        let posts_table = read_txn.open_table(POSTS)?;

        let post_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut posts = Vec::new();
        for post_id in post_ids {
            if let Some(data) = posts_table.get(post_id.as_str())? {
                let post: PostRecord = rmp_serde::from_slice(data.value())?;
                posts.push(post);
            }
        }

        Ok(posts)
    }
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl PostStore for Database {
    async fn insert_post(&self, post: NewPost) -> Result<String, StoreError> {
        let record = PostRecord {
            id: uuid::Uuid::new_v4().to_string(),
            title: post.title,
            media_kind: post.media_kind,
            filename: post.filename,
            file_ext: post.file_ext,
            owner_id: post.owner_id,
            created_at: Utc::now(),
        };
        self.put_post(&record)?;
        tracing::debug!(post_id = %record.id, "Inserted post record");
        Ok(record.id)
    }

    async fn get_post(&self, id: &str) -> Result<PostRecord, StoreError> {
        self.get_post_record(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete_post(&self, id: &str) -> Result<(), StoreError> {
        if self.delete_post_record(id)? {
            tracing::debug!(post_id = %id, "Deleted post record");
            Ok(())
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    async fn list_posts(&self) -> Result<Vec<PostRecord>, StoreError> {
        Ok(self.get_all_posts()?)
    }

    async fn list_owner_posts(&self, owner_id: &str) -> Result<Vec<PostRecord>, StoreError> {
        Ok(self.get_posts_by_owner(owner_id)?)
    }
}
