pub mod db;
pub mod models;
pub mod posts;
pub mod tables;
pub mod traits;

pub use db::Database;
pub use models::{MediaKind, NewPost, PostRecord};
pub use traits::{PostStore, StoreError};
