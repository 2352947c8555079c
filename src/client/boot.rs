use super::api::{ApiClientError, JobsApi};
use super::JobSupervisor;
use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::{JobCategory, JobState};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// What one boot probe found for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootObservation {
    Idle,
    /// A job was already running and its poller has been reattached.
    Reattached(JobStatusResponse),
    /// The last run failed; shown in the mirror, not polled.
    Failed(JobStatusResponse),
    Unreachable(String),
}

#[derive(Debug, Clone, Default)]
pub struct BootReport {
    pub observations: Vec<(JobCategory, BootObservation)>,
}

impl BootReport {
    pub fn get(&self, category: JobCategory) -> Option<&BootObservation> {
        self.observations
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, o)| o)
    }

    pub fn reattached(&self) -> Vec<JobCategory> {
        self.observations
            .iter()
            .filter(|(_, o)| matches!(o, BootObservation::Reattached(_)))
            .map(|(c, _)| *c)
            .collect()
    }
}

/// Probes every slot once at caller start so jobs launched by an earlier
/// session are observed again.
pub struct BootReconciler {
    api: Arc<dyn JobsApi>,
}

impl BootReconciler {
    pub fn new(api: Arc<dyn JobsApi>) -> Self {
        Self { api }
    }

    pub async fn reconcile(&self, supervisor: &JobSupervisor) -> BootReport {
        let probes = JobCategory::ALL.map(|category| {
            let api = self.api.clone();
            async move { (category, api.status(category).await) }
        });

        let mut report = BootReport::default();
        for (category, result) in join_all(probes).await {
            let observation = self.apply(supervisor, category, result).await;
            report.observations.push((category, observation));
        }

        info!(
            "Boot reconciliation finished, reattached: {:?}",
            report.reattached()
        );
        report
    }

    async fn apply(
        &self,
        supervisor: &JobSupervisor,
        category: JobCategory,
        result: Result<JobStatusResponse, ApiClientError>,
    ) -> BootObservation {
        let mirror = supervisor.mirror(category);
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                warn!(%category, "Boot probe failed: {}", e);
                mirror.mark_error(e.to_string()).await;
                return BootObservation::Unreachable(e.to_string());
            }
        };

        match status.state() {
            JobState::Idle => BootObservation::Idle,
            JobState::Error => {
                mirror.replace(status.clone()).await;
                BootObservation::Failed(status)
            }
            JobState::Starting | JobState::Running => {
                info!(%category, subject_id = ?status.subject_id, "Reattaching to running job");
                mirror.replace(status.clone()).await;
                supervisor.poller(category).start().await;
                BootObservation::Reattached(status)
            }
        }
    }
}
