use crate::config::settings::AppConfig;
use crate::infrastructure::library::VideoStore;
use crate::infrastructure::media::MediaTools;
use crate::modules::jobs::registry::JobRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub jobs: JobRegistry,
    pub library: Arc<dyn VideoStore>,
    pub media: MediaTools,
}

impl AppState {
    pub fn new(config: AppConfig, library: Arc<dyn VideoStore>) -> Self {
        let media = MediaTools::new(&config.ffmpeg_bin, config.hw_accel);
        Self {
            config,
            jobs: JobRegistry::new(),
            library,
            media,
        }
    }
}
