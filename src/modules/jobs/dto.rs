use super::model::{JobCategory, JobSlot, JobState, ScanKind};
use crate::infrastructure::library::{Video, VideoId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Snapshot of one slot as it travels over the wire. Callers keep their local
/// mirror in this same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    /// `idle`, `starting`, a running label such as `scanning`, or `error`
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub progress: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default, alias = "video_id", skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<VideoId>,
}

impl JobStatusResponse {
    pub fn idle() -> Self {
        Self {
            status: "idle".to_string(),
            message: String::new(),
            progress: 0,
            total: 0,
            subject_id: None,
        }
    }

    pub fn starting(message: impl Into<String>, subject_id: Option<VideoId>) -> Self {
        Self {
            status: "starting".to_string(),
            message: message.into(),
            subject_id,
            ..Self::idle()
        }
    }

    pub fn state(&self) -> JobState {
        JobState::from_label(&self.status)
    }

    pub fn scan_kind(&self) -> Option<ScanKind> {
        ScanKind::from_message(&self.message)
    }
}

impl From<&JobSlot> for JobStatusResponse {
    fn from(slot: &JobSlot) -> Self {
        Self {
            status: slot.status_label().to_string(),
            message: slot.message.clone(),
            progress: slot.progress,
            total: slot.total,
            subject_id: slot.subject_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartScanRequest {
    #[serde(default)]
    pub full_scan: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobAcceptedResponse {
    pub category: JobCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<VideoId>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub id: VideoId,
    pub filename: String,
    pub video_path: String,
    pub file_size: i64,
    pub thumbnail_path: Option<String>,
    pub transcoded_path: Option<String>,
}

impl From<Video> for VideoResponse {
    fn from(v: Video) -> Self {
        Self {
            id: v.id,
            filename: v.filename,
            video_path: v.video_path,
            file_size: v.file_size,
            thumbnail_path: v.thumbnail_path,
            transcoded_path: v.transcoded_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn running_slot_serializes_with_category_label() {
        let mut slot = JobSlot::idle(JobCategory::Transcode);
        slot.state = JobState::Running;
        slot.message = "Starting optimization for: a.mkv".to_string();
        slot.subject_id = Some(12);

        let body = serde_json::to_value(JobStatusResponse::from(&slot)).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "transcoding",
                "message": "Starting optimization for: a.mkv",
                "progress": 0,
                "total": 0,
                "subjectId": 12
            })
        );
    }

    #[test]
    fn legacy_video_id_field_is_accepted() {
        let status: JobStatusResponse =
            serde_json::from_value(json!({"status": "transcoding", "message": "", "video_id": 9})).unwrap();
        assert_eq!(status.subject_id, Some(9));
        assert_eq!(status.state(), JobState::Running);
        assert_eq!(status.total, 0);
    }
}
