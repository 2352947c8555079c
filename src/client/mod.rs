//! Caller side of the job protocol: an HTTP client for the job endpoints,
//! local mirrors of each slot, one poller per category, the transcode queue
//! and boot reconciliation.

pub mod api;
pub mod boot;
pub mod mirror;
pub mod poller;
pub mod queue;

use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::{JobCategory, ScanKind};
use api::{ApiClientError, JobsApi, StartRequest};
use async_trait::async_trait;
use boot::{BootReconciler, BootReport};
use mirror::Mirror;
use poller::{PollObserver, Poller};
use queue::QueueCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Called on every completion edge, e.g. to refetch whatever the finished
/// job changed.
pub type CompletionHook = Arc<dyn Fn(JobCategory, &JobStatusResponse) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub scan: Duration,
    pub thumbnails: Duration,
    pub cleanup: Duration,
    pub transcode: Duration,
}

impl PollIntervals {
    pub fn uniform(period: Duration) -> Self {
        Self {
            scan: period,
            thumbnails: period,
            cleanup: period,
            transcode: period,
        }
    }

    pub fn for_category(&self, category: JobCategory) -> Duration {
        match category {
            JobCategory::Scan => self.scan,
            JobCategory::Thumbnails => self.thumbnails,
            JobCategory::Cleanup => self.cleanup,
            JobCategory::Transcode => self.transcode,
        }
    }
}

struct CompletionObserver {
    hook: Option<CompletionHook>,
}

#[async_trait]
impl PollObserver for CompletionObserver {
    async fn on_complete(&self, category: JobCategory, status: &JobStatusResponse) {
        if let Some(hook) = &self.hook {
            hook(category, status);
        }
    }
}

/// Owns everything the caller keeps per category and is the one place that
/// turns user actions into Start requests.
pub struct JobSupervisor {
    api: Arc<dyn JobsApi>,
    mirrors: [Arc<Mirror>; 4],
    scan: Arc<Poller>,
    thumbnails: Arc<Poller>,
    cleanup: Arc<Poller>,
    queue: Arc<QueueCoordinator>,
}

impl JobSupervisor {
    pub fn new(api: Arc<dyn JobsApi>, intervals: PollIntervals, hook: Option<CompletionHook>) -> Self {
        let mirrors = JobCategory::ALL.map(|category| Arc::new(Mirror::new(category)));
        let observer: Arc<dyn PollObserver> = Arc::new(CompletionObserver { hook: hook.clone() });

        let plain = |category: JobCategory| {
            Arc::new(Poller::new(
                category,
                intervals.for_category(category),
                api.clone(),
                mirrors[category.index()].clone(),
                observer.clone(),
            ))
        };
        let scan = plain(JobCategory::Scan);
        let thumbnails = plain(JobCategory::Thumbnails);
        let cleanup = plain(JobCategory::Cleanup);

        let queue = QueueCoordinator::new(
            api.clone(),
            mirrors[JobCategory::Transcode.index()].clone(),
            intervals.transcode,
            hook,
        );

        Self {
            api,
            mirrors,
            scan,
            thumbnails,
            cleanup,
            queue,
        }
    }

    pub fn mirror(&self, category: JobCategory) -> &Arc<Mirror> {
        &self.mirrors[category.index()]
    }

    pub fn poller(&self, category: JobCategory) -> &Arc<Poller> {
        match category {
            JobCategory::Scan => &self.scan,
            JobCategory::Thumbnails => &self.thumbnails,
            JobCategory::Cleanup => &self.cleanup,
            JobCategory::Transcode => self.queue.poller(),
        }
    }

    pub fn queue(&self) -> &Arc<QueueCoordinator> {
        &self.queue
    }

    pub async fn reconcile(&self) -> BootReport {
        BootReconciler::new(self.api.clone()).reconcile(self).await
    }

    /// Transcode requests go through the queue and never fail here. For the
    /// other categories a conflict still starts the poller so the running job
    /// is observed, and is then reported back.
    pub async fn start(&self, request: StartRequest) -> Result<(), ApiClientError> {
        let category = request.category();
        let message = match request {
            StartRequest::Transcode(id) => {
                self.queue.enqueue(id).await;
                return Ok(());
            }
            StartRequest::Scan { full_scan } => ScanKind::from_full_flag(full_scan).start_message(),
            StartRequest::Thumbnails => "Initializing task...".to_string(),
            StartRequest::Cleanup => "Starting cleanup...".to_string(),
        };

        match self.api.start(request).await {
            Ok(()) => {
                info!(%category, "Job accepted");
                self.mirror(category)
                    .replace(JobStatusResponse::starting(message, None))
                    .await;
                self.poller(category).start().await;
                Ok(())
            }
            Err(ApiClientError::Conflict(message)) => {
                self.poller(category).start().await;
                Err(ApiClientError::Conflict(message))
            }
            Err(e) => Err(e),
        }
    }

    /// True once no tracked job is in flight and the queue cannot move any
    /// further on its own.
    pub async fn settled(&self) -> bool {
        for category in JobCategory::ALL {
            if !self.poller(category).is_quiet().await || self.mirror(category).state().await.is_active() {
                return false;
            }
        }
        self.queue.is_empty().await || self.queue.is_stalled()
    }

    pub async fn snapshot(&self) -> Vec<(JobCategory, JobStatusResponse)> {
        let mut out = Vec::with_capacity(JobCategory::ALL.len());
        for category in JobCategory::ALL {
            out.push((category, self.mirror(category).get().await));
        }
        out
    }

    pub async fn shutdown(&self) {
        for category in JobCategory::ALL {
            self.poller(category).stop().await;
        }
    }
}
