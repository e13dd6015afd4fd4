use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run status as reported by the job runner. Unrecognised values fold into
/// `Other` instead of failing the whole payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    #[serde(other)]
    Other,
}

impl RunStatus {
    /// Queued and in-progress runs both count as active.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    #[serde(other)]
    Other,
}

/// One execution of a remote workflow. Field names follow the runner's
/// `workflow_runs[]` entries so the payload deserializes directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Workflow file path, e.g. `.github/workflows/deploy.yml`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<RunConclusion>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: String,
}

impl WorkflowRun {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed && self.conclusion == Some(RunConclusion::Success)
    }
}

/// The three workflows whose history determines infrastructure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    Deploy,
    Teardown,
    Destroy,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 3] = [
        WorkflowKind::Deploy,
        WorkflowKind::Teardown,
        WorkflowKind::Destroy,
    ];

    /// Substring searched in the run name when no path is available.
    pub fn name_hint(&self) -> &'static str {
        match self {
            WorkflowKind::Deploy => "Deploy",
            WorkflowKind::Teardown => "Teardown",
            WorkflowKind::Destroy => "Destroy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_runner_payload() {
        let run: WorkflowRun = serde_json::from_value(serde_json::json!({
            "id": 42,
            "name": "Deploy",
            "path": ".github/workflows/deploy.yml",
            "status": "completed",
            "conclusion": "success",
            "updated_at": "2026-01-20T10:00:00Z",
            "html_url": "https://example.test/runs/42"
        }))
        .unwrap();
        assert!(run.is_success());
        assert_eq!(run.path.as_deref(), Some(".github/workflows/deploy.yml"));
    }

    #[test]
    fn unknown_status_and_null_conclusion() {
        let run: WorkflowRun = serde_json::from_value(serde_json::json!({
            "status": "waiting",
            "conclusion": null,
            "updated_at": "2026-01-20T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(run.status, RunStatus::Other);
        assert_eq!(run.conclusion, None);
        assert!(!run.status.is_active());
        assert!(!run.is_success());
    }
}
