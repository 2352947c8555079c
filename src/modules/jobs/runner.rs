use super::registry::JobTicket;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

/// A long-running operation bound to one job slot.
///
/// `run` reports progress through the ticket and returns the completion
/// message on success. Errors are written to the slot as-is; nothing retries.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self, ticket: &JobTicket) -> anyhow::Result<String>;

    /// Runs after a successful run has been written back as idle.
    async fn after_finish(&self) {}
}

pub struct JobRunner;

impl JobRunner {
    pub fn launch<J: Job>(ticket: JobTicket, job: J) -> JoinHandle<()> {
        let span = info_span!("job", category = %ticket.category(), run_id = %ticket.run_id());

        tokio::spawn(
            async move {
                info!("Job started");
                let outcome = AssertUnwindSafe(job.run(&ticket)).catch_unwind().await;

                match outcome {
                    Ok(Ok(message)) => {
                        info!("Job finished: {}", message);
                        ticket.finish(message).await;
                        job.after_finish().await;
                    }
                    Ok(Err(e)) => {
                        error!("Job failed: {:#}", e);
                        ticket.fail(format!("{e:#}")).await;
                    }
                    Err(_) => {
                        error!("Job panicked");
                        ticket.fail("Job aborted unexpectedly.").await;
                    }
                }
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::model::{JobCategory, JobState};
    use crate::modules::jobs::registry::JobRegistry;
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct GatedJob {
        gate: Arc<Notify>,
        fail: bool,
    }

    #[async_trait]
    impl Job for GatedJob {
        async fn run(&self, ticket: &JobTicket) -> anyhow::Result<String> {
            ticket.report("Working", 1, 2).await;
            self.gate.notified().await;
            if self.fail {
                anyhow::bail!("collaborator exited with status 1");
            }
            Ok("All done.".to_string())
        }
    }

    struct FollowUpJob {
        registry: JobRegistry,
        seen: Arc<std::sync::Mutex<Option<JobState>>>,
    }

    #[async_trait]
    impl Job for FollowUpJob {
        async fn run(&self, _ticket: &JobTicket) -> anyhow::Result<String> {
            Ok("Scan complete.".to_string())
        }

        async fn after_finish(&self) {
            let state = self.registry.snapshot(JobCategory::Scan).await.state;
            *self.seen.lock().unwrap() = Some(state);
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl Job for PanickingJob {
        async fn run(&self, _ticket: &JobTicket) -> anyhow::Result<String> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn progress_is_visible_before_completion() {
        let registry = JobRegistry::new();
        let gate = Arc::new(Notify::new());
        let ticket = registry.try_admit(JobCategory::Scan, None, "Full scan started.").await.unwrap();

        let handle = JobRunner::launch(ticket, GatedJob { gate: gate.clone(), fail: false });

        let mut observed = registry.snapshot(JobCategory::Scan).await;
        for _ in 0..100 {
            if observed.state == JobState::Running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            observed = registry.snapshot(JobCategory::Scan).await;
        }
        assert_eq!(observed.state, JobState::Running);
        assert_eq!(observed.message, "Working");

        gate.notify_one();
        handle.await.unwrap();

        let done = registry.snapshot(JobCategory::Scan).await;
        assert_eq!(done.state, JobState::Idle);
        assert_eq!(done.message, "All done.");
    }

    #[tokio::test]
    async fn failure_is_written_as_error_and_not_retried() {
        let registry = JobRegistry::new();
        let gate = Arc::new(Notify::new());
        gate.notify_one();
        let ticket = registry.try_admit(JobCategory::Transcode, Some(3), "Starting transcode...").await.unwrap();

        JobRunner::launch(ticket, GatedJob { gate, fail: true }).await.unwrap();

        let slot = registry.snapshot(JobCategory::Transcode).await;
        assert_eq!(slot.state, JobState::Error);
        assert_eq!(slot.message, "collaborator exited with status 1");
        assert_eq!(slot.subject_id, Some(3));
    }

    #[tokio::test]
    async fn panicking_job_releases_the_slot() {
        let registry = JobRegistry::new();
        let ticket = registry.try_admit(JobCategory::Cleanup, None, "Starting cleanup...").await.unwrap();

        JobRunner::launch(ticket, PanickingJob).await.unwrap();

        let slot = registry.snapshot(JobCategory::Cleanup).await;
        assert_eq!(slot.state, JobState::Error);
        assert!(registry.try_admit(JobCategory::Cleanup, None, "again").await.is_ok());
    }

    #[tokio::test]
    async fn follow_up_runs_after_the_slot_is_idle() {
        let registry = JobRegistry::new();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let ticket = registry.try_admit(JobCategory::Scan, None, "New-only scan started.").await.unwrap();

        JobRunner::launch(ticket, FollowUpJob { registry: registry.clone(), seen: seen.clone() })
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(JobState::Idle));
    }
}
