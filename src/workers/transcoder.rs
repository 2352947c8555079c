use crate::infrastructure::library::Video;
use crate::modules::jobs::registry::JobTicket;
use crate::modules::jobs::runner::Job;
use crate::state::AppState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct TranscodeJob {
    state: AppState,
    video: Video,
}

impl TranscodeJob {
    pub fn new(state: AppState, video: Video) -> Self {
        Self { state, video }
    }
}

/// Where the optimized copy of a video lives.
pub fn optimized_path(state: &AppState, video: &Video) -> PathBuf {
    state.config.optimized_dir().join(format!("{}_opt.mp4", video.id))
}

#[async_trait]
impl Job for TranscodeJob {
    async fn run(&self, ticket: &JobTicket) -> Result<String> {
        let video = &self.video;
        ticket
            .report(format!("Starting optimization for: {}", video.filename), 0, 0)
            .await;

        let output = optimized_path(&self.state, video);
        if let Some(dir) = output.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        if output.exists() {
            info!("Transcoded file already exists: {}", output.display());
        } else {
            ticket
                .note(format!("Encoding {} ({:?})", video.filename, self.state.config.hw_accel))
                .await;
            self.state
                .media
                .transcode(Path::new(&video.video_path), &output)
                .await
                .context("FFmpeg failed")?;
        }

        let output = output.to_string_lossy();
        self.state
            .library
            .set_transcoded(video.id, Some(&output))
            .await?;
        info!("Transcode complete: {}", output);

        Ok("Transcode complete.".to_string())
    }
}
