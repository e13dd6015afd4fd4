//! Infrastructure lifecycle inferred from workflow run history.
//!
//! Nothing here is persisted: every query lists recent runs from a
//! [`JobHistoryProvider`] and folds them with [`infer_state`].

pub mod infer;
pub mod run;

use async_trait::async_trait;
use nexus_core::Result;
use tracing::debug;

pub use infer::{infer_state, InfraState, LatestRuns, LifecycleReport, RunClassifier, RunSummary};
pub use run::{RunConclusion, RunStatus, WorkflowKind, WorkflowRun};

/// Source of recent workflow runs, newest first. A missing or malformed
/// payload must surface as `NexusError::UpstreamUnavailable`.
#[async_trait]
pub trait JobHistoryProvider: Send + Sync {
    async fn list_recent_runs(&self, limit: u32) -> Result<Vec<WorkflowRun>>;
}

/// Fetch `limit` recent runs and reduce them to a report.
pub async fn current_state(
    provider: &dyn JobHistoryProvider,
    classifier: &RunClassifier,
    limit: u32,
) -> Result<LifecycleReport> {
    let runs = provider.list_recent_runs(limit).await?;
    let report = infer_state(&runs, classifier);
    debug!(
        runs = runs.len(),
        state = ?report.infra_state,
        in_progress = report.in_progress,
        "lifecycle state inferred"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nexus_core::NexusError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedHistory {
        runs: Vec<WorkflowRun>,
        last_limit: AtomicU32,
    }

    #[async_trait]
    impl JobHistoryProvider for FixedHistory {
        async fn list_recent_runs(&self, limit: u32) -> Result<Vec<WorkflowRun>> {
            self.last_limit.store(limit, Ordering::SeqCst);
            Ok(self.runs.clone())
        }
    }

    struct BrokenHistory;

    #[async_trait]
    impl JobHistoryProvider for BrokenHistory {
        async fn list_recent_runs(&self, _limit: u32) -> Result<Vec<WorkflowRun>> {
            Err(NexusError::UpstreamUnavailable {
                status: Some(502),
                message: "bad gateway".into(),
            })
        }
    }

    #[tokio::test]
    async fn report_comes_from_provider_runs() {
        let provider = FixedHistory {
            runs: vec![WorkflowRun {
                path: Some(".github/workflows/deploy.yml".into()),
                name: Some("Deploy".into()),
                status: RunStatus::Completed,
                conclusion: Some(RunConclusion::Success),
                updated_at: Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap(),
                html_url: String::new(),
            }],
            last_limit: AtomicU32::new(0),
        };
        let report = current_state(&provider, &RunClassifier::default(), 20)
            .await
            .unwrap();
        assert_eq!(report.infra_state, InfraState::Deployed);
        assert_eq!(provider.last_limit.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn provider_failure_is_not_unknown() {
        let err = current_state(&BrokenHistory, &RunClassifier::default(), 20)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_UNAVAILABLE");
    }
}
