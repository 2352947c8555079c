use anyhow::anyhow;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    LibraryDir,
    DataDir,
    FfmpegBin,
    HwAccel,
    AutoChainThumbnails,
    InitialScan,
    WatchLibrary,
    WatchDebounceMs,
    ServerUrl,
    PollScanMs,
    PollThumbnailsMs,
    PollCleanupMs,
    PollTranscodeMs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::LibraryDir => "LIBRARY_DIR",
            EnvKey::DataDir => "DATA_DIR",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
            EnvKey::HwAccel => "HW_ACCEL",
            EnvKey::AutoChainThumbnails => "AUTO_CHAIN_THUMBNAILS",
            EnvKey::InitialScan => "INITIAL_SCAN",
            EnvKey::WatchLibrary => "WATCH_LIBRARY",
            EnvKey::WatchDebounceMs => "WATCH_DEBOUNCE_MS",
            EnvKey::ServerUrl => "SERVER_URL",
            EnvKey::PollScanMs => "POLL_SCAN_MS",
            EnvKey::PollThumbnailsMs => "POLL_THUMBNAILS_MS",
            EnvKey::PollCleanupMs => "POLL_CLEANUP_MS",
            EnvKey::PollTranscodeMs => "POLL_TRANSCODE_MS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Like [`get_parsed`], but a value that is set and does not parse is an error.
pub fn get_required_parse<T>(key: EnvKey, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(key.as_str(), get_opt(key), default)
}

fn parse_value<T>(name: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid {name} value '{val}': {e}")),
        None => Ok(default),
    }
}
