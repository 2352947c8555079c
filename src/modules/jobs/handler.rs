use super::dto::{JobAcceptedResponse, JobStatusResponse, StartScanRequest, VideoResponse};
use super::model::{JobCategory, ScanKind};
use super::service::JobService;
use crate::common::error::AppError;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess, ErrorBody};
use crate::infrastructure::library::VideoId;
use crate::state::AppState;
use axum_extra::extract::WithRejection;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

fn accepted(result: Result<JobAcceptedResponse, AppError>, message: &str) -> axum::response::Response {
    match result {
        Ok(res) => ApiSuccess(ApiResponse::success(res, message), StatusCode::ACCEPTED).into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}

/// Current status of one job slot
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{category}/status",
    params(
        ("category" = JobCategory, Path, description = "scan, thumbnails, cleanup or transcode")
    ),
    responses(
        (status = 200, description = "Slot snapshot", body = JobStatusResponse),
        (status = 400, description = "Unknown category")
    ),
    tag = "Jobs"
)]
pub async fn get_job_status(
    State(state): State<AppState>,
    WithRejection(Path(category), _): WithRejection<Path<JobCategory>, AppError>,
) -> impl IntoResponse {
    Json(JobService::status(&state, category).await)
}

/// Start a library scan
#[utoipa::path(
    post,
    path = "/api/v1/jobs/scan/start",
    request_body(content = StartScanRequest, description = "Empty body runs a new-only scan"),
    responses(
        (status = 202, description = "Scan started", body = ApiResponse<JobAcceptedResponse>),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 409, description = "A scan is already running", body = ErrorBody)
    ),
    tag = "Jobs"
)]
pub async fn start_scan(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartScanRequest::default()
    } else {
        match serde_json::from_slice::<StartScanRequest>(&body) {
            Ok(req) => req,
            Err(e) => {
                return AppError::Validation(format!("Invalid scan request: {e}")).into_response();
            }
        }
    };

    let kind = ScanKind::from_full_flag(request.full_scan);
    accepted(
        JobService::start_scan(state, kind).await,
        "Scan started in background.",
    )
}

/// Generate missing thumbnails
#[utoipa::path(
    post,
    path = "/api/v1/jobs/thumbnails/start",
    responses(
        (status = 202, description = "Thumbnail generation started", body = ApiResponse<JobAcceptedResponse>),
        (status = 409, description = "Thumbnail generation already running", body = ErrorBody)
    ),
    tag = "Jobs"
)]
pub async fn start_thumbnails(State(state): State<AppState>) -> impl IntoResponse {
    accepted(
        JobService::start_thumbnails(state).await,
        "Thumbnail generation started in background.",
    )
}

/// Prune records whose files are gone
#[utoipa::path(
    post,
    path = "/api/v1/jobs/cleanup/start",
    responses(
        (status = 202, description = "Cleanup started", body = ApiResponse<JobAcceptedResponse>),
        (status = 409, description = "Cleanup already running", body = ErrorBody)
    ),
    tag = "Jobs"
)]
pub async fn start_cleanup(State(state): State<AppState>) -> impl IntoResponse {
    accepted(
        JobService::start_cleanup(state).await,
        "Library cleanup started in background.",
    )
}

/// Transcode one video
#[utoipa::path(
    post,
    path = "/api/v1/video/{id}/transcode/start",
    params(
        ("id" = i64, Path, description = "Video ID")
    ),
    responses(
        (status = 202, description = "Transcode started", body = ApiResponse<JobAcceptedResponse>),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 404, description = "Video not found", body = ErrorBody),
        (status = 409, description = "A transcode is already running", body = ErrorBody)
    ),
    tag = "Jobs"
)]
pub async fn start_transcode(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<VideoId>, AppError>,
) -> impl IntoResponse {
    accepted(
        JobService::start_transcode(state, id).await,
        "Transcode started in background.",
    )
}

/// Delete the optimized copy of a video
#[utoipa::path(
    post,
    path = "/api/v1/video/{id}/transcode/delete",
    params(
        ("id" = i64, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Transcode deleted", body = ApiResponse<VideoResponse>),
        (status = 404, description = "Nothing to delete", body = ErrorBody),
        (status = 409, description = "Video is being transcoded", body = ErrorBody)
    ),
    tag = "Jobs"
)]
pub async fn delete_transcode(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<VideoId>, AppError>,
) -> impl IntoResponse {
    match JobService::delete_transcode(state, id).await {
        Ok(video) => ApiSuccess(
            ApiResponse::success(video, "Transcode deleted."),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}
