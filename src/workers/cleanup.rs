use crate::infrastructure::library::scanner::LibraryScanner;
use crate::infrastructure::library::Video;
use crate::modules::jobs::registry::JobTicket;
use crate::modules::jobs::runner::Job;
use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

pub struct CleanupJob {
    state: AppState,
}

impl CleanupJob {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Job for CleanupJob {
    async fn run(&self, ticket: &JobTicket) -> Result<String> {
        ticket.report("Finding all video files...", 0, 0).await;

        let scanner = LibraryScanner::new(self.state.config.library_dir.clone());
        let found = tokio::task::spawn_blocking(move || scanner.discover_paths()).await?;
        info!("Cleanup: found {} items on disk", found.len());

        ticket.report("Pruning deleted items...", 0, found.len() as u64).await;
        let removed = prune_missing(&self.state, &found).await?;

        Ok(format!("Cleanup complete. Removed {removed} items."))
    }
}

/// Drops records whose file is gone from disk, along with their thumbnail and
/// optimized output. Returns how many records were removed.
pub async fn prune_missing(state: &AppState, found: &HashSet<String>) -> Result<usize> {
    let removed = state.library.remove_missing(found).await?;
    for video in &removed {
        remove_artifacts(video).await;
        info!("Pruned video record: {}", video.video_path);
    }
    Ok(removed.len())
}

async fn remove_artifacts(video: &Video) {
    for artifact in [&video.thumbnail_path, &video.transcoded_path].into_iter().flatten() {
        match tokio::fs::remove_file(Path::new(artifact)).await {
            Ok(()) => info!("Deleted {}", artifact),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete {}: {}", artifact, e),
        }
    }
}
