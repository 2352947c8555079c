use super::{DiscoveredVideo, Upsert, Video, VideoId, VideoStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    next_id: VideoId,
    videos: BTreeMap<VideoId, Video>,
}

/// Process-local store used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryVideoStore {
    inner: Mutex<Inner>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn count(&self) -> Result<i64> {
        Ok(self.inner.lock().await.videos.len() as i64)
    }

    async fn known_paths(&self) -> Result<HashSet<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.videos.values().map(|v| v.video_path.clone()).collect())
    }

    async fn upsert(&self, video: &DiscoveredVideo) -> Result<Upsert> {
        let mut inner = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();

        if let Some(existing) = inner
            .videos
            .values_mut()
            .find(|v| v.video_path == video.video_path)
        {
            existing.filename = video.filename.clone();
            existing.file_size = video.file_size;
            existing.updated_at = now;
            return Ok(Upsert::Updated);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.videos.insert(
            id,
            Video {
                id,
                video_path: video.video_path.clone(),
                filename: video.filename.clone(),
                file_size: video.file_size,
                thumbnail_path: None,
                transcoded_path: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(Upsert::Added)
    }

    async fn find(&self, id: VideoId) -> Result<Option<Video>> {
        Ok(self.inner.lock().await.videos.get(&id).cloned())
    }

    async fn thumbnail_candidates(&self) -> Result<Vec<Video>> {
        Ok(self.inner.lock().await.videos.values().cloned().collect())
    }

    async fn set_thumbnail(&self, id: VideoId, path: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let video = inner
            .videos
            .get_mut(&id)
            .ok_or_else(|| anyhow!("Video {} not found", id))?;
        video.thumbnail_path = Some(path.to_string());
        video.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn set_transcoded(&self, id: VideoId, path: Option<&str>) -> Result<Video> {
        let mut inner = self.inner.lock().await;
        let video = inner
            .videos
            .get_mut(&id)
            .ok_or_else(|| anyhow!("Video {} not found", id))?;
        video.transcoded_path = path.map(str::to_string);
        video.updated_at = OffsetDateTime::now_utc();
        Ok(video.clone())
    }

    async fn remove_missing(&self, found: &HashSet<String>) -> Result<Vec<Video>> {
        let mut inner = self.inner.lock().await;
        let missing: Vec<VideoId> = inner
            .videos
            .values()
            .filter(|v| !found.contains(&v.video_path))
            .map(|v| v.id)
            .collect();

        Ok(missing
            .into_iter()
            .filter_map(|id| inner.videos.remove(&id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovered(path: &str, size: i64) -> DiscoveredVideo {
        DiscoveredVideo {
            video_path: path.to_string(),
            filename: path.rsplit('/').next().unwrap().to_string(),
            file_size: size,
        }
    }

    #[tokio::test]
    async fn upsert_then_prune() {
        let store = MemoryVideoStore::new();
        assert_eq!(store.upsert(&discovered("/lib/a.mkv", 1)).await.unwrap(), Upsert::Added);
        assert_eq!(store.upsert(&discovered("/lib/b.mp4", 2)).await.unwrap(), Upsert::Added);
        assert_eq!(store.upsert(&discovered("/lib/a.mkv", 5)).await.unwrap(), Upsert::Updated);
        assert_eq!(store.count().await.unwrap(), 2);

        let found: HashSet<String> = ["/lib/b.mp4".to_string()].into_iter().collect();
        let removed = store.remove_missing(&found).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].video_path, "/lib/a.mkv");
        assert_eq!(removed[0].file_size, 5);
        assert_eq!(store.known_paths().await.unwrap(), found);
    }

    #[tokio::test]
    async fn transcoded_path_can_be_cleared() {
        let store = MemoryVideoStore::new();
        store.upsert(&discovered("/lib/a.mkv", 1)).await.unwrap();

        let video = store.set_transcoded(1, Some("/data/optimized/1_opt.mp4")).await.unwrap();
        assert_eq!(video.transcoded_path.as_deref(), Some("/data/optimized/1_opt.mp4"));
        let video = store.set_transcoded(1, None).await.unwrap();
        assert_eq!(video.transcoded_path, None);
        assert!(store.set_transcoded(99, None).await.is_err());
    }
}
