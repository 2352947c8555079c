use super::{DiscoveredVideo, Upsert, Video, VideoId, VideoStore};
use crate::infrastructure::db::DbPool;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

const VIDEO_COLUMNS: &str =
    "id, video_path, filename, file_size, thumbnail_path, transcoded_path, created_at, updated_at";

pub struct PgVideoStore {
    pool: DbPool,
}

impl PgVideoStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS videos (
                id BIGSERIAL PRIMARY KEY,
                video_path TEXT NOT NULL UNIQUE,
                filename TEXT NOT NULL,
                file_size BIGINT NOT NULL DEFAULT 0,
                thumbnail_path TEXT,
                transcoded_path TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to create videos table: {}", e))?;

        info!("✅ Video schema ready");
        Ok(())
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to count videos: {}", e))?;
        Ok(count)
    }

    async fn known_paths(&self) -> Result<HashSet<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT video_path FROM videos")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to load video paths: {}", e))?;
        Ok(paths.into_iter().collect())
    }

    async fn upsert(&self, video: &DiscoveredVideo) -> Result<Upsert> {
        // xmax is zero only for a freshly inserted row
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO videos (video_path, filename, file_size)
            VALUES ($1, $2, $3)
            ON CONFLICT (video_path) DO UPDATE
            SET filename = EXCLUDED.filename,
                file_size = EXCLUDED.file_size,
                updated_at = NOW()
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&video.video_path)
        .bind(&video.filename)
        .bind(video.file_size)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to upsert video: {}", e))?;

        Ok(if inserted { Upsert::Added } else { Upsert::Updated })
    }

    async fn find(&self, id: VideoId) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch video: {}", e))?;
        Ok(video)
    }

    async fn thumbnail_candidates(&self) -> Result<Vec<Video>> {
        let videos = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch videos: {}", e))?;
        Ok(videos)
    }

    async fn set_thumbnail(&self, id: VideoId, path: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE videos SET thumbnail_path = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(path)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Video {} not found", id));
        }
        Ok(())
    }

    async fn set_transcoded(&self, id: VideoId, path: Option<&str>) -> Result<Video> {
        sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET transcoded_path = $1, updated_at = NOW() WHERE id = $2 RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(path)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to update video: {}", e))?
        .ok_or_else(|| anyhow!("Video {} not found", id))
    }

    async fn remove_missing(&self, found: &HashSet<String>) -> Result<Vec<Video>> {
        let found: Vec<String> = found.iter().cloned().collect();
        let removed = sqlx::query_as::<_, Video>(&format!(
            "DELETE FROM videos WHERE NOT (video_path = ANY($1)) RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(found)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to prune videos: {}", e))?;
        Ok(removed)
    }
}
