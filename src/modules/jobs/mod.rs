use axum::routing::{get, post};
use axum::Router;
use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod model;
pub mod registry;
pub mod runner;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs/{category}/status", get(handler::get_job_status))
        .route("/jobs/scan/start", post(handler::start_scan))
        .route("/jobs/thumbnails/start", post(handler::start_thumbnails))
        .route("/jobs/cleanup/start", post(handler::start_cleanup))
        .route("/video/{id}/transcode/start", post(handler::start_transcode))
        .route("/video/{id}/transcode/delete", post(handler::delete_transcode))
}
