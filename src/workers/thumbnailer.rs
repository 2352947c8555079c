use crate::modules::jobs::registry::JobTicket;
use crate::modules::jobs::runner::Job;
use crate::state::AppState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

pub struct ThumbnailJob {
    state: AppState,
}

impl ThumbnailJob {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Job for ThumbnailJob {
    async fn run(&self, ticket: &JobTicket) -> Result<String> {
        let thumb_dir = self.state.config.thumbnail_dir();
        tokio::fs::create_dir_all(&thumb_dir)
            .await
            .with_context(|| format!("Failed to create {}", thumb_dir.display()))?;

        ticket.report("Checking for missing or broken thumbnails...", 0, 0).await;
        let pending: Vec<_> = self
            .state
            .library
            .thumbnail_candidates()
            .await?
            .into_iter()
            .filter(|v| match &v.thumbnail_path {
                Some(path) => !Path::new(path).exists(),
                None => true,
            })
            .collect();

        let total = pending.len() as u64;
        info!("Found {} videos needing thumbnails", total);
        ticket.report(format!("Found {total} videos to process."), 0, total).await;

        let mut generated = 0u64;
        for (i, video) in pending.iter().enumerate() {
            ticket
                .report(format!("Generating thumbnail for {}", video.filename), i as u64, total)
                .await;

            let source = Path::new(&video.video_path);
            if !source.exists() {
                warn!("Skipping {} (source file not found)", video.filename);
                continue;
            }

            let target = thumb_dir.join(format!("{}.jpg", video.id));
            if let Err(e) = self.state.media.extract_frame(source, &target).await {
                warn!("Thumbnail failed for {}: {:#}", video.filename, e);
                continue;
            }

            let target = target.to_string_lossy();
            match self.state.library.set_thumbnail(video.id, &target).await {
                Ok(()) => generated += 1,
                Err(e) => warn!("Failed to record thumbnail for {}: {:#}", video.filename, e),
            }
        }

        Ok(format!("Done. Generated {generated} of {total} thumbnails."))
    }
}
