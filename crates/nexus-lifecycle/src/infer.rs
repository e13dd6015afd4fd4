use chrono::{DateTime, Utc};
use nexus_core::config::WorkflowFiles;
use serde::Serialize;

use crate::run::{RunConclusion, RunStatus, WorkflowKind, WorkflowRun};

/// Infrastructure state as reconstructed from workflow history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InfraState {
    Unknown,
    Running,
    Deployed,
    TornDown,
    Destroyed,
}

impl InfraState {
    fn settled_by(kind: WorkflowKind) -> Self {
        match kind {
            WorkflowKind::Deploy => InfraState::Deployed,
            WorkflowKind::Teardown => InfraState::TornDown,
            WorkflowKind::Destroy => InfraState::Destroyed,
        }
    }
}

/// Maps runs to a [`WorkflowKind`] by workflow file, or by display name when
/// the runner gave no path.
#[derive(Debug, Clone)]
pub struct RunClassifier {
    deploy: String,
    teardown: String,
    destroy: String,
}

impl RunClassifier {
    pub fn new(files: &WorkflowFiles) -> Self {
        Self {
            deploy: files.deploy.clone(),
            teardown: files.teardown.clone(),
            destroy: files.destroy.clone(),
        }
    }

    fn file(&self, kind: WorkflowKind) -> &str {
        match kind {
            WorkflowKind::Deploy => &self.deploy,
            WorkflowKind::Teardown => &self.teardown,
            WorkflowKind::Destroy => &self.destroy,
        }
    }

    pub fn classify(&self, run: &WorkflowRun) -> Option<WorkflowKind> {
        match run.path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => WorkflowKind::ALL
                .into_iter()
                .find(|kind| path.contains(self.file(*kind))),
            None => {
                let name = run.name.as_deref()?;
                WorkflowKind::ALL
                    .into_iter()
                    .find(|kind| name.contains(kind.name_hint()))
            }
        }
    }
}

impl Default for RunClassifier {
    fn default() -> Self {
        Self::new(&WorkflowFiles::default())
    }
}

/// A kept run plus its position in the provider's listing.
#[derive(Debug, Clone)]
struct Slot {
    position: usize,
    run: WorkflowRun,
}

/// Most recent run per workflow kind.
#[derive(Debug, Clone, Default)]
pub struct LatestRuns {
    deploy: Option<Slot>,
    teardown: Option<Slot>,
    destroy: Option<Slot>,
}

impl LatestRuns {
    /// First run of each kind in provider order wins; later ones are older.
    pub fn collect<'a>(
        runs: impl IntoIterator<Item = &'a WorkflowRun>,
        classifier: &RunClassifier,
    ) -> Self {
        runs.into_iter()
            .enumerate()
            .fold(Self::default(), |mut acc, (position, run)| {
                if let Some(kind) = classifier.classify(run) {
                    let slot = acc.slot_mut(kind);
                    if slot.is_none() {
                        *slot = Some(Slot {
                            position,
                            run: run.clone(),
                        });
                    }
                }
                acc
            })
    }

    fn slot_mut(&mut self, kind: WorkflowKind) -> &mut Option<Slot> {
        match kind {
            WorkflowKind::Deploy => &mut self.deploy,
            WorkflowKind::Teardown => &mut self.teardown,
            WorkflowKind::Destroy => &mut self.destroy,
        }
    }

    fn slot(&self, kind: WorkflowKind) -> Option<&Slot> {
        match kind {
            WorkflowKind::Deploy => self.deploy.as_ref(),
            WorkflowKind::Teardown => self.teardown.as_ref(),
            WorkflowKind::Destroy => self.destroy.as_ref(),
        }
    }

    pub fn get(&self, kind: WorkflowKind) -> Option<&WorkflowRun> {
        self.slot(kind).map(|s| &s.run)
    }

    fn kept(&self) -> impl Iterator<Item = (WorkflowKind, &Slot)> + '_ {
        WorkflowKind::ALL
            .into_iter()
            .filter_map(|kind| self.slot(kind).map(|slot| (kind, slot)))
    }
}

/// Client-facing view of a kept run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub status: RunStatus,
    pub conclusion: Option<RunConclusion>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

impl From<&WorkflowRun> for RunSummary {
    fn from(run: &WorkflowRun) -> Self {
        Self {
            status: run.status,
            conclusion: run.conclusion,
            updated_at: run.updated_at,
            url: run.html_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowSummaries {
    pub deploy: Option<RunSummary>,
    pub teardown: Option<RunSummary>,
    pub destroy: Option<RunSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleReport {
    pub infra_state: InfraState,
    pub in_progress: bool,
    pub workflows: WorkflowSummaries,
}

/// Reduce recent history (newest first) to the current infrastructure state.
///
/// An active run of any kind means `Running`. Otherwise the newest
/// successful kept run decides; equal timestamps keep provider order.
pub fn infer_state(runs: &[WorkflowRun], classifier: &RunClassifier) -> LifecycleReport {
    let latest = LatestRuns::collect(runs, classifier);

    let in_progress = latest.kept().any(|(_, slot)| slot.run.status.is_active());
    let infra_state = if in_progress {
        InfraState::Running
    } else {
        latest
            .kept()
            .filter(|(_, slot)| slot.run.is_success())
            .min_by(|(_, a), (_, b)| {
                b.run
                    .updated_at
                    .cmp(&a.run.updated_at)
                    .then(a.position.cmp(&b.position))
            })
            .map(|(kind, _)| InfraState::settled_by(kind))
            .unwrap_or(InfraState::Unknown)
    };

    let summary = |kind| latest.get(kind).map(RunSummary::from);
    LifecycleReport {
        infra_state,
        in_progress,
        workflows: WorkflowSummaries {
            deploy: summary(WorkflowKind::Deploy),
            teardown: summary(WorkflowKind::Teardown),
            destroy: summary(WorkflowKind::Destroy),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap()
    }

    fn run(
        file: &str,
        status: RunStatus,
        conclusion: Option<RunConclusion>,
        ago_min: i64,
    ) -> WorkflowRun {
        WorkflowRun {
            path: Some(format!(".github/workflows/{file}")),
            name: None,
            status,
            conclusion,
            updated_at: t0() - Duration::minutes(ago_min),
            html_url: format!("https://example.test/{file}/{ago_min}"),
        }
    }

    fn ok(file: &str, ago_min: i64) -> WorkflowRun {
        run(file, RunStatus::Completed, Some(RunConclusion::Success), ago_min)
    }

    #[test]
    fn teardown_after_deploy_is_torn_down() {
        let runs = vec![ok("teardown.yml", 10), ok("deploy.yml", 30)];
        let report = infer_state(&runs, &RunClassifier::default());
        assert_eq!(report.infra_state, InfraState::TornDown);
        assert!(!report.in_progress);
    }

    #[test]
    fn active_run_wins_over_newer_success() {
        let runs = vec![
            ok("deploy.yml", 1),
            run("teardown.yml", RunStatus::InProgress, None, 5),
        ];
        let report = infer_state(&runs, &RunClassifier::default());
        assert_eq!(report.infra_state, InfraState::Running);
        assert!(report.in_progress);
    }

    #[test]
    fn queued_counts_as_running() {
        let runs = vec![run("destroy-all.yml", RunStatus::Queued, None, 0)];
        assert_eq!(
            infer_state(&runs, &RunClassifier::default()).infra_state,
            InfraState::Running
        );
    }

    #[test]
    fn only_first_run_per_kind_is_kept() {
        // older in-progress deploy is shadowed by the newer completed one
        let runs = vec![
            ok("deploy.yml", 2),
            run("deploy.yml", RunStatus::InProgress, None, 60),
        ];
        let report = infer_state(&runs, &RunClassifier::default());
        assert_eq!(report.infra_state, InfraState::Deployed);
        assert!(!report.in_progress);
    }

    #[test]
    fn failed_latest_falls_back_to_other_success() {
        let runs = vec![
            run("deploy.yml", RunStatus::Completed, Some(RunConclusion::Failure), 5),
            ok("destroy-all.yml", 90),
        ];
        let report = infer_state(&runs, &RunClassifier::default());
        assert_eq!(report.infra_state, InfraState::Destroyed);
    }

    #[test]
    fn no_success_is_unknown() {
        let runs = vec![run(
            "teardown.yml",
            RunStatus::Completed,
            Some(RunConclusion::Cancelled),
            5,
        )];
        assert_eq!(
            infer_state(&runs, &RunClassifier::default()).infra_state,
            InfraState::Unknown
        );
        assert_eq!(infer_state(&[], &RunClassifier::default()).infra_state, InfraState::Unknown);
    }

    #[test]
    fn equal_timestamps_keep_provider_order() {
        let runs = vec![ok("destroy-all.yml", 10), ok("deploy.yml", 10)];
        assert_eq!(
            infer_state(&runs, &RunClassifier::default()).infra_state,
            InfraState::Destroyed
        );
        let runs = vec![ok("deploy.yml", 10), ok("destroy-all.yml", 10)];
        assert_eq!(
            infer_state(&runs, &RunClassifier::default()).infra_state,
            InfraState::Deployed
        );
    }

    #[test]
    fn name_fallback_only_without_path() {
        let classifier = RunClassifier::default();
        let mut r = ok("ci.yml", 0);
        r.name = Some("Teardown stack".into());
        assert_eq!(classifier.classify(&r), None);

        r.path = None;
        assert_eq!(classifier.classify(&r), Some(WorkflowKind::Teardown));

        r.path = Some(String::new());
        r.name = Some("Destroy everything".into());
        assert_eq!(classifier.classify(&r), Some(WorkflowKind::Destroy));
    }

    #[test]
    fn custom_workflow_files_classify() {
        let files = WorkflowFiles {
            deploy: "up.yaml".into(),
            ..WorkflowFiles::default()
        };
        let classifier = RunClassifier::new(&files);
        assert_eq!(classifier.classify(&ok("up.yaml", 0)), Some(WorkflowKind::Deploy));
        assert_eq!(classifier.classify(&ok("deploy.yml", 0)), None);
    }

    #[test]
    fn report_serializes_kebab_state_and_summaries() {
        let runs = vec![ok("teardown.yml", 10)];
        let v = serde_json::to_value(infer_state(&runs, &RunClassifier::default())).unwrap();
        assert_eq!(v["infraState"], "torn-down");
        assert_eq!(v["inProgress"], false);
        assert_eq!(v["workflows"]["teardown"]["conclusion"], "success");
        assert_eq!(v["workflows"]["teardown"]["url"], "https://example.test/teardown.yml/10");
        assert!(v["workflows"]["deploy"].is_null());
    }
}
