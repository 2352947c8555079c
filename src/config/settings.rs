use crate::config::env::{self, EnvKey};
use crate::infrastructure::media::HwAccel;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub library_dir: PathBuf,
    pub data_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub hw_accel: HwAccel,
    pub auto_chain_thumbnails: bool,
    pub initial_scan: bool,
    pub watch_library: bool,
    pub watch_debounce: Duration,
}

impl AppConfig {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            server_port: env::get_required_parse(EnvKey::ServerPort, 3000)?,
            database_url: env::get_opt(EnvKey::DatabaseUrl),
            library_dir: PathBuf::from(env::get_or(EnvKey::LibraryDir, "./library")),
            data_dir: PathBuf::from(env::get_or(EnvKey::DataDir, "./data")),
            ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, "ffmpeg"),
            hw_accel: env::get_required_parse(EnvKey::HwAccel, HwAccel::Cpu)?,
            auto_chain_thumbnails: env::get_required_parse(EnvKey::AutoChainThumbnails, true)?,
            initial_scan: env::get_required_parse(EnvKey::InitialScan, true)?,
            watch_library: env::get_required_parse(EnvKey::WatchLibrary, true)?,
            watch_debounce: Duration::from_millis(env::get_required_parse(EnvKey::WatchDebounceMs, 2000)?),
        })
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.data_dir.join("thumbnails")
    }

    pub fn optimized_dir(&self) -> PathBuf {
        self.data_dir.join("optimized")
    }
}

/// Settings for the polling side of the protocol.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub scan_poll_ms: u64,
    pub thumbnails_poll_ms: u64,
    pub cleanup_poll_ms: u64,
    pub transcode_poll_ms: u64,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            server_url: env::get_or(EnvKey::ServerUrl, "http://127.0.0.1:3000"),
            scan_poll_ms: env::get_parsed(EnvKey::PollScanMs, 3000),
            thumbnails_poll_ms: env::get_parsed(EnvKey::PollThumbnailsMs, 3000),
            cleanup_poll_ms: env::get_parsed(EnvKey::PollCleanupMs, 3000),
            transcode_poll_ms: env::get_parsed(EnvKey::PollTranscodeMs, 2000),
        }
    }

    pub fn intervals(&self) -> crate::client::PollIntervals {
        crate::client::PollIntervals {
            scan: Duration::from_millis(self.scan_poll_ms),
            thumbnails: Duration::from_millis(self.thumbnails_poll_ms),
            cleanup: Duration::from_millis(self.cleanup_poll_ms),
            transcode: Duration::from_millis(self.transcode_poll_ms),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
