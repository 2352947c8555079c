use crate::client::api::{ApiClientError, JobsApi, StartRequest};
use crate::client::poller::PollObserver;
use crate::config::settings::AppConfig;
use crate::infrastructure::library::memory::MemoryVideoStore;
use crate::infrastructure::media::HwAccel;
use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::JobCategory;
use crate::state::AppState;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

const WAIT_LIMIT: Duration = Duration::from_secs(5);
const WAIT_STEP: Duration = Duration::from_millis(10);

pub struct TestDirs {
    pub library: TempDir,
    pub data: TempDir,
}

pub fn test_config(dirs: &TestDirs) -> AppConfig {
    AppConfig {
        server_port: 0,
        database_url: None,
        library_dir: dirs.library.path().to_path_buf(),
        data_dir: dirs.data.path().to_path_buf(),
        ffmpeg_bin: "/nonexistent/ffmpeg".to_string(),
        hw_accel: HwAccel::Cpu,
        auto_chain_thumbnails: false,
        initial_scan: false,
        watch_library: false,
        watch_debounce: Duration::from_millis(100),
    }
}

/// Memory-backed state over two fresh temp dirs. The dirs are removed when
/// the returned guard drops.
pub fn test_state() -> (AppState, TestDirs) {
    let dirs = TestDirs {
        library: TempDir::new().expect("library tempdir"),
        data: TempDir::new().expect("data tempdir"),
    };
    let state = AppState::new(test_config(&dirs), Arc::new(MemoryVideoStore::new()));
    (state, dirs)
}

pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {WAIT_LIMIT:?}"
        );
        tokio::time::sleep(WAIT_STEP).await;
    }
}

pub async fn wait_for_terminal(state: &AppState, category: JobCategory) -> JobStatusResponse {
    wait_until(|| async { state.jobs.snapshot(category).await.state.is_terminal() }).await;
    JobStatusResponse::from(&state.jobs.snapshot(category).await)
}

/// In-process stand-in for the job server. Accepted starts flip the fake slot
/// to its running label; tests finish runs with [`FakeJobsApi::finish`].
#[derive(Default)]
pub struct FakeJobsApi {
    statuses: Mutex<HashMap<JobCategory, JobStatusResponse>>,
    scripted: Mutex<VecDeque<Result<(), ApiClientError>>>,
    started: Mutex<Vec<StartRequest>>,
    offline: AtomicBool,
    status_calls: AtomicUsize,
}

impl FakeJobsApi {
    pub async fn set_status(&self, category: JobCategory, status: JobStatusResponse) {
        self.statuses.lock().await.insert(category, status);
    }

    pub async fn finish(&self, category: JobCategory, message: &str) {
        let mut done = JobStatusResponse::idle();
        done.message = message.to_string();
        self.set_status(category, done).await;
    }

    /// Queues the answer for the next start call; unscripted calls succeed.
    pub async fn script_start(&self, result: Result<(), ApiClientError>) {
        self.scripted.lock().await.push_back(result);
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub async fn started(&self) -> Vec<StartRequest> {
        self.started.lock().await.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn offline_error() -> ApiClientError {
        ApiClientError::Transport("connection refused".to_string())
    }
}

#[async_trait]
impl JobsApi for FakeJobsApi {
    async fn start(&self, request: StartRequest) -> Result<(), ApiClientError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Self::offline_error());
        }
        self.started.lock().await.push(request);

        let result = self.scripted.lock().await.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            let category = request.category();
            let subject_id = match request {
                StartRequest::Transcode(id) => Some(id),
                _ => None,
            };
            let running = JobStatusResponse {
                status: category.running_label().to_string(),
                message: "Working...".to_string(),
                progress: 0,
                total: 0,
                subject_id,
            };
            self.set_status(category, running).await;
        }
        result
    }

    async fn status(&self, category: JobCategory) -> Result<JobStatusResponse, ApiClientError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Self::offline_error());
        }
        Ok(self
            .statuses
            .lock()
            .await
            .get(&category)
            .cloned()
            .unwrap_or_else(JobStatusResponse::idle))
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    completions: Mutex<Vec<JobStatusResponse>>,
    progress: AtomicUsize,
    idle: AtomicUsize,
}

impl RecordingObserver {
    pub async fn completions(&self) -> Vec<JobStatusResponse> {
        self.completions.lock().await.clone()
    }

    pub fn progress_ticks(&self) -> usize {
        self.progress.load(Ordering::SeqCst)
    }

    pub fn idle_ticks(&self) -> usize {
        self.idle.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollObserver for RecordingObserver {
    async fn on_progress(&self, _category: JobCategory, _status: &JobStatusResponse) {
        self.progress.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_complete(&self, _category: JobCategory, status: &JobStatusResponse) {
        self.completions.lock().await.push(status.clone());
    }

    async fn on_idle(&self, _category: JobCategory, _status: &JobStatusResponse) {
        self.idle.fetch_add(1, Ordering::SeqCst);
    }
}
