//! Library directory watcher.
//!
//! Debounced filesystem events start a new-only scan when videos appear or
//! get renamed, and a cleanup when they disappear. Both go through normal
//! admission, so a busy slot simply skips the trigger.

use crate::common::error::AppError;
use crate::infrastructure::library::scanner::is_video;
use crate::modules::jobs::model::ScanKind;
use crate::modules::jobs::service::JobService;
use crate::state::AppState;
use anyhow::Context;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryChange {
    Appeared,
    Vanished,
}

/// Keeps the OS watch alive; dropping it stops both the watch and the
/// dispatch task.
pub struct LibraryWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl LibraryWatcher {
    pub fn start(state: AppState) -> anyhow::Result<Self> {
        let root = canonical(&state.config.library_dir);
        let ignored = canonical(&state.config.data_dir);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(state.config.watch_debounce, move |result: DebounceEventResult| {
            if tx.send(result).is_err() {
                debug!("Library watcher channel closed");
            }
        })
        .context("Failed to create library watcher")?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        info!("Watching {} for changes", root.display());

        let task = tokio::spawn(dispatch(state, ignored, rx));
        Ok(Self {
            _debouncer: debouncer,
            task,
        })
    }
}

impl Drop for LibraryWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

async fn dispatch(
    state: AppState,
    ignored: PathBuf,
    mut rx: mpsc::UnboundedReceiver<DebounceEventResult>,
) {
    while let Some(result) = rx.recv().await {
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                warn!("Library watcher error: {:?}", e);
                continue;
            }
        };

        let changes: Vec<LibraryChange> = events
            .iter()
            .filter_map(|event| classify(&event.path, &ignored))
            .collect();

        if changes.contains(&LibraryChange::Appeared) {
            match JobService::start_scan(state.clone(), ScanKind::New).await {
                Ok(_) => info!("New files detected, scan started"),
                Err(AppError::Conflict(_)) => debug!("Scan already in progress, skipping trigger"),
                Err(e) => warn!("Could not start scan: {}", e),
            }
        }
        if changes.contains(&LibraryChange::Vanished) {
            match JobService::start_cleanup(state.clone()).await {
                Ok(_) => info!("Deleted files detected, cleanup started"),
                Err(AppError::Conflict(_)) => debug!("Cleanup already in progress, skipping trigger"),
                Err(e) => warn!("Could not start cleanup: {}", e),
            }
        }
    }
}

/// Maps one changed path to what it means for the library. Hidden files,
/// non-video files, directories and anything under `ignored` are dropped.
pub fn classify(path: &Path, ignored: &Path) -> Option<LibraryChange> {
    if path.starts_with(ignored) {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') || !is_video(path) || path.is_dir() {
        return None;
    }

    if path.exists() {
        Some(LibraryChange::Appeared)
    } else {
        Some(LibraryChange::Vanished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::model::JobCategory;
    use crate::tests::support::{test_state, wait_until};
    use std::time::Duration;

    #[test]
    fn classify_ignores_noise() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let video = dir.path().join("a.mkv");
        std::fs::write(&video, b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        assert_eq!(classify(&video, &data), Some(LibraryChange::Appeared));
        assert_eq!(classify(&dir.path().join("gone.mp4"), &data), Some(LibraryChange::Vanished));
        assert_eq!(classify(&dir.path().join("notes.txt"), &data), None);
        assert_eq!(classify(&dir.path().join(".partial.mp4"), &data), None);
        assert_eq!(classify(&data.join("optimized/1_opt.mp4"), &data), None);
    }

    #[tokio::test]
    async fn new_and_deleted_files_trigger_scan_and_cleanup() {
        let (state, dirs) = test_state();
        let _watcher = LibraryWatcher::start(state.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let video = dirs.library.path().join("clip.mp4");
        std::fs::write(&video, b"clip").unwrap();
        wait_until(|| async { state.library.count().await.unwrap() == 1 }).await;
        wait_until(|| async { state.jobs.snapshot(JobCategory::Scan).await.state.is_terminal() }).await;

        std::fs::remove_file(&video).unwrap();
        wait_until(|| async {
            let cleanup = state.jobs.snapshot(JobCategory::Cleanup).await;
            cleanup.state.is_terminal() && cleanup.message.starts_with("Cleanup complete")
        })
        .await;
        assert_eq!(state.library.count().await.unwrap(), 0);
    }
}
