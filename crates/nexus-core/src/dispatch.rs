use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Remote jobs the control plane can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowJob {
    Deploy,
    Teardown,
    Destroy,
    SpinUp,
}

impl WorkflowJob {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowJob::Deploy => "deploy",
            WorkflowJob::Teardown => "teardown",
            WorkflowJob::Destroy => "destroy",
            WorkflowJob::SpinUp => "spin-up",
        }
    }
}

impl fmt::Display for WorkflowJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs forwarded verbatim to the remote job.
pub type JobInputs = BTreeMap<String, String>;

/// Result of a dispatch attempt. Transport failures are errors; a reachable
/// runner that refuses the job is a `Rejected` outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Accepted,
    Rejected { status: u16, reason: String },
}

impl DispatchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DispatchOutcome::Accepted)
    }
}

/// Fire-and-forget start of an asynchronous remote job.
#[async_trait]
pub trait TriggerDispatcher: Send + Sync {
    async fn dispatch(&self, job: WorkflowJob, inputs: JobInputs) -> Result<DispatchOutcome>;
}

/// Build a `JobInputs` map from string pairs.
pub fn inputs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> JobInputs {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
