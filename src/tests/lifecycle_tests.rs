//! Caller side against a real server bound to an ephemeral port.

use super::support::{test_state, wait_for_terminal, wait_until, TestDirs};
use crate::app::create_app;
use crate::client::api::{ApiClientError, HttpJobsApi, JobsApi, StartRequest};
use crate::client::poller::PollerState;
use crate::client::{CompletionHook, JobSupervisor, PollIntervals};
use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::{JobCategory, JobState};
use crate::state::AppState;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(25);

async fn spawn_server() -> (AppState, TestDirs, String) {
    let (state, dirs) = test_state();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, dirs, format!("http://{addr}"))
}

#[tokio::test]
async fn test_start_conflict_restart_over_http() {
    let (state, _dirs, url) = spawn_server().await;
    let api = HttpJobsApi::new(&url).unwrap();

    let ticket = state
        .jobs
        .try_admit(JobCategory::Scan, None, "New-only scan started.")
        .await
        .unwrap();
    assert!(matches!(
        api.start(StartRequest::Scan { full_scan: true }).await,
        Err(ApiClientError::Conflict(_))
    ));
    ticket.finish("Scan complete. Added 0, updated 0, removed 0.").await;

    assert_eq!(api.start(StartRequest::Scan { full_scan: false }).await, Ok(()));
    wait_for_terminal(&state, JobCategory::Scan).await;
    let status = api.status(JobCategory::Scan).await.unwrap();
    assert_eq!(status.state(), JobState::Idle);
    assert_eq!(status.message, "Scan complete. Added 0, updated 0, removed 0.");
}

#[tokio::test]
async fn test_supervisor_observes_scan_to_completion() {
    let (_state, dirs, url) = spawn_server().await;
    std::fs::write(dirs.library.path().join("one.mp4"), b"1").unwrap();
    std::fs::write(dirs.library.path().join("two.webm"), b"2").unwrap();

    let seen: Arc<Mutex<Vec<(JobCategory, JobStatusResponse)>>> = Arc::default();
    let sink = seen.clone();
    let hook: CompletionHook = Arc::new(move |category: JobCategory, status: &JobStatusResponse| {
        sink.lock().unwrap().push((category, status.clone()));
    });

    let api = Arc::new(HttpJobsApi::new(&url).unwrap());
    let supervisor = JobSupervisor::new(api, PollIntervals::uniform(TICK), Some(hook));
    supervisor.start(StartRequest::Scan { full_scan: true }).await.unwrap();
    wait_until(|| async { supervisor.settled().await }).await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, JobCategory::Scan);
    assert_eq!(seen[0].1.message, "Scan complete. Added 2, updated 0, removed 0.");
}

#[tokio::test]
async fn test_boot_reattaches_after_caller_restart() {
    let (state, _dirs, url) = spawn_server().await;
    let ticket = state
        .jobs
        .try_admit(JobCategory::Transcode, Some(8), "Starting transcode...")
        .await
        .unwrap();
    ticket.note("Starting optimization for: eight.mkv").await;

    let api = Arc::new(HttpJobsApi::new(&url).unwrap());
    let supervisor = JobSupervisor::new(api, PollIntervals::uniform(TICK), None);
    let report = supervisor.reconcile().await;

    assert_eq!(report.reattached(), vec![JobCategory::Transcode]);
    let mirrored = supervisor.mirror(JobCategory::Transcode).get().await;
    assert_eq!(mirrored, JobStatusResponse::from(&state.jobs.snapshot(JobCategory::Transcode).await));
    assert_eq!(mirrored.subject_id, Some(8));
    assert_eq!(
        supervisor.poller(JobCategory::Transcode).state().await,
        PollerState::Polling
    );

    // the queued id waits behind the running job
    supervisor.start(StartRequest::Transcode(8)).await.unwrap();
    assert!(supervisor.queue().is_empty().await);

    ticket.finish("Transcode complete.").await;
    wait_until(|| async { supervisor.settled().await }).await;
    assert_eq!(supervisor.mirror(JobCategory::Transcode).state().await, JobState::Idle);
}

#[tokio::test]
async fn test_transcode_queue_walks_through_videos() {
    let (state, dirs, url) = spawn_server().await;
    for name in ["a.mkv", "b.mkv", "c.mkv"] {
        std::fs::write(dirs.library.path().join(name), name.as_bytes()).unwrap();
    }
    let api = Arc::new(HttpJobsApi::new(&url).unwrap());
    assert_eq!(api.start(StartRequest::Scan { full_scan: false }).await, Ok(()));
    wait_for_terminal(&state, JobCategory::Scan).await;

    let supervisor = JobSupervisor::new(api, PollIntervals::uniform(TICK), None);
    // keep the slot busy so all three ids land in the queue first
    let ticket = state
        .jobs
        .try_admit(JobCategory::Transcode, Some(99), "Starting transcode...")
        .await
        .unwrap();
    supervisor.reconcile().await;
    for id in [1, 2, 3, 2] {
        supervisor.start(StartRequest::Transcode(id)).await.unwrap();
    }
    assert_eq!(supervisor.queue().pending().await, vec![1, 2, 3]);

    ticket.finish("Transcode complete.").await;
    wait_until(|| async { supervisor.settled().await }).await;

    // every encode fails without a real ffmpeg, the last one stays visible
    assert!(supervisor.queue().is_empty().await);
    let last = supervisor.mirror(JobCategory::Transcode).get().await;
    assert_eq!(last.state(), JobState::Error);
    assert_eq!(last.subject_id, Some(3));
}
