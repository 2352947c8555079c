use super::api::{ApiClientError, JobsApi, StartRequest};
use super::mirror::Mirror;
use super::poller::{PollObserver, Poller};
use super::CompletionHook;
use crate::infrastructure::library::VideoId;
use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::JobCategory;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Caller-side transcode queue. The server runs one transcode at a time and
/// answers 409 otherwise, so ids wait here until the slot frees up. Nothing
/// here survives a restart of the caller.
pub struct QueueCoordinator {
    api: Arc<dyn JobsApi>,
    mirror: Arc<Mirror>,
    poller: Arc<Poller>,
    pending: Mutex<VecDeque<VideoId>>,
    drain_gate: Mutex<()>,
    stalled: AtomicBool,
}

impl QueueCoordinator {
    pub fn new(
        api: Arc<dyn JobsApi>,
        mirror: Arc<Mirror>,
        period: Duration,
        hook: Option<CompletionHook>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|queue: &Weak<QueueCoordinator>| {
            let observer = Arc::new(TranscodeObserver {
                queue: queue.clone(),
                hook,
            });
            let poller = Arc::new(Poller::new(
                JobCategory::Transcode,
                period,
                api.clone(),
                mirror.clone(),
                observer,
            ));
            QueueCoordinator {
                api,
                mirror,
                poller,
                pending: Mutex::new(VecDeque::new()),
                drain_gate: Mutex::new(()),
                stalled: AtomicBool::new(false),
            }
        })
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    pub fn mirror(&self) -> &Arc<Mirror> {
        &self.mirror
    }

    pub async fn pending(&self) -> Vec<VideoId> {
        self.pending.lock().await.iter().copied().collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Set when the last drain could not reach the server. The queue then
    /// only moves on the next explicit enqueue or drain.
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }

    /// Queues `id` unless it is already waiting or is the video the slot is
    /// working on right now. Returns whether the id was added.
    pub async fn enqueue(&self, id: VideoId) -> bool {
        {
            let mut pending = self.pending.lock().await;
            if pending.contains(&id) {
                debug!(video_id = id, "Already queued");
                return false;
            }
            let current = self.mirror.get().await;
            if current.state().is_active() && current.subject_id == Some(id) {
                debug!(video_id = id, "Already transcoding");
                return false;
            }
            pending.push_back(id);
        }

        self.drain().await;
        true
    }

    /// Moves the queue forward while the mirrored slot is free.
    pub async fn drain(&self) {
        let _gate = self.drain_gate.lock().await;

        loop {
            if self.mirror.state().await.is_active() {
                return;
            }
            let Some(id) = self.pending.lock().await.pop_front() else {
                return;
            };
            self.stalled.store(false, Ordering::SeqCst);

            match self.api.start(StartRequest::Transcode(id)).await {
                Ok(()) => {
                    info!(video_id = id, "Transcode accepted");
                    self.mirror
                        .replace(JobStatusResponse::starting("Starting transcode...", Some(id)))
                        .await;
                    self.poller.start().await;
                    return;
                }
                Err(ApiClientError::Conflict(message)) => {
                    // dropped; the next completion edge moves on to the following id
                    info!(video_id = id, "Transcode slot busy: {}", message);
                    self.poller.start().await;
                    return;
                }
                Err(ApiClientError::Rejected { status, message }) => {
                    warn!(video_id = id, status, "Transcode rejected: {}", message);
                }
                Err(ApiClientError::Transport(message)) => {
                    warn!(video_id = id, "Could not reach server: {}", message);
                    self.pending.lock().await.push_front(id);
                    self.stalled.store(true, Ordering::SeqCst);
                    self.mirror.mark_error(message).await;
                    return;
                }
            }
        }
    }
}

struct TranscodeObserver {
    queue: Weak<QueueCoordinator>,
    hook: Option<CompletionHook>,
}

#[async_trait]
impl PollObserver for TranscodeObserver {
    async fn on_complete(&self, category: JobCategory, status: &JobStatusResponse) {
        if let Some(hook) = &self.hook {
            hook(category, status);
        }
        if let Some(queue) = self.queue.upgrade() {
            queue.drain().await;
        }
    }

    async fn on_idle(&self, _category: JobCategory, _status: &JobStatusResponse) {
        if let Some(queue) = self.queue.upgrade() {
            if !queue.is_empty().await {
                queue.drain().await;
            }
        }
    }
}
