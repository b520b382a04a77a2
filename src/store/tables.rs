use redb::TableDefinition;

/// Post records: uuid -> PostRecord (msgpack)
pub const POSTS: TableDefinition<&str, &[u8]> = TableDefinition::new("posts");

/// Owner index: owner_id -> msgpack Vec of post UUIDs
pub const OWNER_POSTS: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_posts");
