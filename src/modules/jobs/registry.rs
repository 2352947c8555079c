use super::model::{JobCategory, JobSlot, JobState};
use crate::infrastructure::library::VideoId;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("A {category} job is already in progress.")]
pub struct AdmissionConflict {
    pub category: JobCategory,
    pub current: String,
}

/// One slot per job category. Each slot has its own lock, so admission on one
/// category never waits on another.
#[derive(Clone, Debug)]
pub struct JobRegistry {
    slots: [Arc<RwLock<JobSlot>>; 4],
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            slots: JobCategory::ALL.map(|category| Arc::new(RwLock::new(JobSlot::idle(category)))),
        }
    }

    fn slot(&self, category: JobCategory) -> &Arc<RwLock<JobSlot>> {
        &self.slots[category.index()]
    }

    pub async fn snapshot(&self, category: JobCategory) -> JobSlot {
        self.slot(category).read().await.clone()
    }

    /// Atomically moves an `Idle`/`Error` slot to `Starting` and hands back the
    /// ticket the runner writes through. An active slot is left untouched.
    pub async fn try_admit(
        &self,
        category: JobCategory,
        subject_id: Option<VideoId>,
        message: impl Into<String>,
    ) -> Result<JobTicket, AdmissionConflict> {
        let slot = self.slot(category);
        let mut guard = slot.write().await;

        if guard.state.is_active() {
            debug!(%category, state = ?guard.state, "Admission rejected");
            return Err(AdmissionConflict {
                category,
                current: guard.message.clone(),
            });
        }

        let run_id = Uuid::new_v4();
        *guard = JobSlot {
            category,
            state: JobState::Starting,
            message: message.into(),
            progress: 0,
            total: 0,
            subject_id,
            run_id: Some(run_id),
        };

        Ok(JobTicket {
            category,
            run_id,
            slot: Arc::clone(slot),
        })
    }

    /// Locks the slot for the lifetime of the returned hold. Admission and
    /// status reads for `category` wait until it drops, so keep it short.
    pub async fn hold(&self, category: JobCategory) -> SlotHold {
        SlotHold {
            guard: Arc::clone(self.slot(category)).write_owned().await,
        }
    }
}

/// Exclusive view of one slot, see [`JobRegistry::hold`].
pub struct SlotHold {
    guard: OwnedRwLockWriteGuard<JobSlot>,
}

impl Deref for SlotHold {
    type Target = JobSlot;

    fn deref(&self) -> &JobSlot {
        &self.guard
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Write handle for one admitted run. Writes are dropped once the slot no
/// longer carries this run's id.
#[derive(Debug)]
pub struct JobTicket {
    category: JobCategory,
    run_id: Uuid,
    slot: Arc<RwLock<JobSlot>>,
}

impl JobTicket {
    pub fn category(&self) -> JobCategory {
        self.category
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn report(&self, message: impl Into<String>, progress: u64, total: u64) {
        let message = message.into();
        self.write(|slot| {
            slot.state = JobState::Running;
            slot.message = message;
            slot.progress = progress;
            slot.total = total;
        })
        .await;
    }

    /// Updates the message only, keeping the counters.
    pub async fn note(&self, message: impl Into<String>) {
        let message = message.into();
        self.write(|slot| {
            slot.state = JobState::Running;
            slot.message = message;
        })
        .await;
    }

    pub async fn finish(self, message: impl Into<String>) {
        let message = message.into();
        let category = self.category;
        self.write(|slot| {
            *slot = JobSlot {
                message,
                ..JobSlot::idle(category)
            };
        })
        .await;
    }

    pub async fn fail(self, message: impl Into<String>) {
        let message = message.into();
        self.write(|slot| {
            slot.state = JobState::Error;
            slot.message = message;
            slot.run_id = None;
        })
        .await;
    }

    async fn write(&self, apply: impl FnOnce(&mut JobSlot)) {
        let mut slot = self.slot.write().await;
        if slot.run_id != Some(self.run_id) {
            warn!(category = %self.category, run_id = %self.run_id, "Dropping write from a stale job run");
            return;
        }
        apply(&mut slot);
    }
}
