use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::{JobCategory, JobState};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Caller-side copy of one slot. Written by user actions, poll ticks and boot
/// reconciliation; each write replaces the whole record and bumps the write
/// counter.
#[derive(Debug)]
pub struct Mirror {
    category: JobCategory,
    inner: RwLock<JobStatusResponse>,
    writes: AtomicU64,
}

impl Mirror {
    pub fn new(category: JobCategory) -> Self {
        Self {
            category,
            inner: RwLock::new(JobStatusResponse::idle()),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of writes so far. Pair with [`Mirror::replace_if_unchanged`].
    pub fn version(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn get(&self) -> JobStatusResponse {
        self.inner.read().await.clone()
    }

    /// Stores `next` and hands back what was there before, so the caller can
    /// look for a completion edge without a second read.
    pub async fn replace(&self, next: JobStatusResponse) -> JobStatusResponse {
        let mut guard = self.inner.write().await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        std::mem::replace(&mut *guard, next)
    }

    /// Stores `next` only if nothing was written since `seen` was read from
    /// [`Mirror::version`]. Returns the previous record when applied.
    pub async fn replace_if_unchanged(&self, seen: u64, next: JobStatusResponse) -> Option<JobStatusResponse> {
        let mut guard = self.inner.write().await;
        if self.writes.load(Ordering::SeqCst) != seen {
            return None;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Some(std::mem::replace(&mut *guard, next))
    }

    /// Local-only error, used when the server could not be reached. The
    /// subject is kept so the queue still knows what was in flight.
    pub async fn mark_error(&self, message: impl Into<String>) {
        let mut guard = self.inner.write().await;
        debug!(category = %self.category, "Mirror marked as error");
        self.writes.fetch_add(1, Ordering::SeqCst);
        guard.status = "error".to_string();
        guard.message = message.into();
    }

    pub async fn state(&self) -> JobState {
        self.inner.read().await.state()
    }
}
