use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: String,
    pub user_id: i64,
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A drawing row. The scene payload itself lives in the blob store; the row
/// carries its content hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub id: String,
    pub project_id: String,
    pub user_id: i64,
    pub name: String,
    pub payload_hash: String,
    pub share_id: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRecord {
    pub drawing_id: String,
    pub blob_hash: String,
    pub size_bytes: u64,
    pub touched_at: u64,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Millisecond clock for thumbnail recency, where second granularity would
/// collapse the order of touches close together.
pub fn unix_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
