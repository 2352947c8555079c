use super::api::JobsApi;
use super::mirror::Mirror;
use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::JobCategory;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Stopped,
    Polling,
}

/// Hooks a poller calls from its task. They run after the poller has already
/// released itself, so an observer may start the same poller again.
#[async_trait]
pub trait PollObserver: Send + Sync {
    /// A tick that saw the job still starting or running.
    async fn on_progress(&self, _category: JobCategory, _status: &JobStatusResponse) {}

    /// Completion edge: the mirror was active and the server now reports
    /// idle or error. Called once per run.
    async fn on_complete(&self, category: JobCategory, status: &JobStatusResponse);

    /// A tick that found the slot terminal when the mirror was already
    /// terminal, meaning nothing this caller tracked was in flight. Polling
    /// continues.
    async fn on_idle(&self, _category: JobCategory, _status: &JobStatusResponse) {}
}

enum Control {
    Stopped,
    Polling {
        generation: u64,
        cancel: CancellationToken,
    },
}

/// Periodic status poller for one category. At most one polling task exists
/// per poller; `start` while polling does nothing.
pub struct Poller {
    category: JobCategory,
    period: Duration,
    api: Arc<dyn JobsApi>,
    mirror: Arc<Mirror>,
    observer: Arc<dyn PollObserver>,
    control: Mutex<Control>,
    generations: AtomicU64,
    settling: AtomicUsize,
    dormant: AtomicBool,
}

impl Poller {
    pub fn new(
        category: JobCategory,
        period: Duration,
        api: Arc<dyn JobsApi>,
        mirror: Arc<Mirror>,
        observer: Arc<dyn PollObserver>,
    ) -> Self {
        Self {
            category,
            period,
            api,
            mirror,
            observer,
            control: Mutex::new(Control::Stopped),
            generations: AtomicU64::new(0),
            settling: AtomicUsize::new(0),
            dormant: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> PollerState {
        match *self.control.lock().await {
            Control::Stopped => PollerState::Stopped,
            Control::Polling { .. } => PollerState::Polling,
        }
    }

    /// Nothing left to observe: either stopped, or still polling but the last
    /// tick saw an idle slot with nothing in flight. False while an observer
    /// callback is running.
    pub async fn is_quiet(&self) -> bool {
        if self.settling.load(Ordering::SeqCst) > 0 {
            return false;
        }
        match self.state().await {
            PollerState::Stopped => true,
            PollerState::Polling => self.dormant.load(Ordering::SeqCst),
        }
    }

    pub async fn start(self: &Arc<Self>) {
        let mut control = self.control.lock().await;
        if matches!(*control, Control::Polling { .. }) {
            return;
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        self.dormant.store(false, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        *control = Control::Polling {
            generation,
            cancel: cancel.clone(),
        };
        drop(control);

        debug!(category = %self.category, generation, "Poller started");
        tokio::spawn(Arc::clone(self).run(generation, cancel));
    }

    pub async fn stop(&self) {
        let mut control = self.control.lock().await;
        if let Control::Polling { cancel, .. } = &*control {
            cancel.cancel();
        }
        *control = Control::Stopped;
    }

    /// Drops back to `Stopped` if `generation` is still the live one. Returns
    /// false when a newer start has taken over.
    async fn release(&self, generation: u64) -> bool {
        let mut control = self.control.lock().await;
        match &*control {
            Control::Polling { generation: live, .. } if *live == generation => {
                *control = Control::Stopped;
                true
            }
            _ => false,
        }
    }

    async fn run(self: Arc<Self>, generation: u64, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let seen = self.mirror.version();
            let status = match self.api.status(self.category).await {
                Ok(status) => status,
                Err(e) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    warn!(category = %self.category, "Status poll failed, stopping poller: {}", e);
                    self.mirror.mark_error(e.to_string()).await;
                    self.release(generation).await;
                    return;
                }
            };
            if cancel.is_cancelled() {
                return;
            }

            // someone else wrote the mirror while the request was out; this
            // response may predate that write
            let Some(previous) = self.mirror.replace_if_unchanged(seen, status.clone()).await else {
                debug!(category = %self.category, "Discarding status overtaken by a local write");
                continue;
            };
            if status.state().is_active() {
                self.dormant.store(false, Ordering::SeqCst);
                self.observer.on_progress(self.category, &status).await;
                continue;
            }

            self.settling.fetch_add(1, Ordering::SeqCst);
            if !previous.state().is_active() {
                self.observer.on_idle(self.category, &status).await;
                self.dormant.store(true, Ordering::SeqCst);
                self.settling.fetch_sub(1, Ordering::SeqCst);
                continue;
            }

            if self.release(generation).await {
                info!(category = %self.category, status = %status.status, "{}", status.message);
                self.observer.on_complete(self.category, &status).await;
            }
            self.settling.fetch_sub(1, Ordering::SeqCst);
            return;
        }
    }
}
