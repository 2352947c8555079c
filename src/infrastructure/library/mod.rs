use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use time::OffsetDateTime;

pub mod memory;
pub mod postgres;
pub mod scanner;

pub type VideoId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Video {
    pub id: VideoId,
    pub video_path: String,
    pub filename: String,
    pub file_size: i64,
    pub thumbnail_path: Option<String>,
    pub transcoded_path: Option<String>,
    #[serde(with = "time::serde::iso8601")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::iso8601")]
    pub updated_at: OffsetDateTime,
}

/// A media file found on disk by the library walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredVideo {
    pub video_path: String,
    pub filename: String,
    pub file_size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
}

/// Video metadata the background jobs read and write.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn count(&self) -> Result<i64>;

    async fn known_paths(&self) -> Result<HashSet<String>>;

    async fn upsert(&self, video: &DiscoveredVideo) -> Result<Upsert>;

    async fn find(&self, id: VideoId) -> Result<Option<Video>>;

    /// Every video that might need a thumbnail. Whether a recorded thumbnail
    /// still exists on disk is for the caller to check.
    async fn thumbnail_candidates(&self) -> Result<Vec<Video>>;

    async fn set_thumbnail(&self, id: VideoId, path: &str) -> Result<()>;

    async fn set_transcoded(&self, id: VideoId, path: Option<&str>) -> Result<Video>;

    /// Deletes every record whose path is not in `found` and returns them.
    async fn remove_missing(&self, found: &HashSet<String>) -> Result<Vec<Video>>;
}
