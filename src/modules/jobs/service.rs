use super::dto::{JobAcceptedResponse, JobStatusResponse, VideoResponse};
use super::model::{JobCategory, ScanKind};
use super::runner::JobRunner;
use crate::common::error::AppError;
use crate::infrastructure::library::VideoId;
use crate::state::AppState;
use crate::workers::cleanup::CleanupJob;
use crate::workers::scanner::ScanJob;
use crate::workers::thumbnailer::ThumbnailJob;
use crate::workers::transcoder::TranscodeJob;
use tracing::info;

pub struct JobService;

impl JobService {
    pub async fn status(state: &AppState, category: JobCategory) -> JobStatusResponse {
        JobStatusResponse::from(&state.jobs.snapshot(category).await)
    }

    pub async fn start_scan(state: AppState, kind: ScanKind) -> Result<JobAcceptedResponse, AppError> {
        let ticket = state
            .jobs
            .try_admit(JobCategory::Scan, None, kind.start_message())
            .await?;

        info!("Starting {} of {}", kind.tag(), state.config.library_dir.display());
        JobRunner::launch(ticket, ScanJob::new(state, kind));

        Ok(JobAcceptedResponse {
            category: JobCategory::Scan,
            subject_id: None,
        })
    }

    pub async fn start_thumbnails(state: AppState) -> Result<JobAcceptedResponse, AppError> {
        let ticket = state
            .jobs
            .try_admit(JobCategory::Thumbnails, None, "Initializing task...")
            .await?;

        info!("Starting thumbnail generation");
        JobRunner::launch(ticket, ThumbnailJob::new(state));

        Ok(JobAcceptedResponse {
            category: JobCategory::Thumbnails,
            subject_id: None,
        })
    }

    pub async fn start_cleanup(state: AppState) -> Result<JobAcceptedResponse, AppError> {
        let ticket = state
            .jobs
            .try_admit(JobCategory::Cleanup, None, "Starting cleanup...")
            .await?;

        info!("Starting library cleanup");
        JobRunner::launch(ticket, CleanupJob::new(state));

        Ok(JobAcceptedResponse {
            category: JobCategory::Cleanup,
            subject_id: None,
        })
    }

    /// The video is looked up before admission, so an unknown id never
    /// touches the slot.
    pub async fn start_transcode(state: AppState, id: VideoId) -> Result<JobAcceptedResponse, AppError> {
        let video = state
            .library
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {id} not found.")))?;

        let ticket = state
            .jobs
            .try_admit(JobCategory::Transcode, Some(id), "Starting transcode...")
            .await?;

        info!("Starting transcode for video {} ({})", id, video.filename);
        JobRunner::launch(ticket, TranscodeJob::new(state, video));

        Ok(JobAcceptedResponse {
            category: JobCategory::Transcode,
            subject_id: Some(id),
        })
    }

    /// The transcode slot is held for the whole delete, so no transcode of
    /// the same video can be admitted while its output is being removed.
    pub async fn delete_transcode(state: AppState, id: VideoId) -> Result<VideoResponse, AppError> {
        let slot = state.jobs.hold(JobCategory::Transcode).await;
        if slot.state.is_active() && slot.subject_id == Some(id) {
            return Err(AppError::Busy(format!(
                "Video {id} is being transcoded right now."
            )));
        }

        let video = state
            .library
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {id} not found.")))?;
        let Some(path) = video.transcoded_path.as_deref() else {
            return Err(AppError::NotFound("No transcode to delete.".to_string()));
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => info!("Deleted transcoded file: {}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(anyhow::anyhow!("Failed to delete {}: {}", path, e).into()),
        }

        let video = state.library.set_transcoded(id, None).await?;
        drop(slot);
        Ok(VideoResponse::from(video))
    }

    /// Kicks off a full scan when the library has never been scanned.
    pub async fn initial_scan_if_empty(state: &AppState) -> Result<bool, AppError> {
        let count = state.library.count().await?;
        if count > 0 {
            info!("Library already contains {} videos", count);
            return Ok(false);
        }

        info!("No videos found, starting initial scan");
        match Self::start_scan(state.clone(), ScanKind::Full).await {
            Ok(_) => Ok(true),
            Err(AppError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
