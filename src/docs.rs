use utoipa::OpenApi;
use crate::common::response::ErrorBody;
use crate::modules::jobs::dto::*;
use crate::modules::jobs::model::JobCategory;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::jobs::handler::get_job_status,
        crate::modules::jobs::handler::start_scan,
        crate::modules::jobs::handler::start_thumbnails,
        crate::modules::jobs::handler::start_cleanup,
        crate::modules::jobs::handler::start_transcode,
        crate::modules::jobs::handler::delete_transcode,
    ),
    components(
        schemas(
            JobCategory, JobStatusResponse, JobAcceptedResponse, StartScanRequest,
            VideoResponse, ErrorBody,
        )
    ),
    tags(
        (name = "Jobs", description = "Background job admission and status")
    )
)]
pub struct ApiDoc;
