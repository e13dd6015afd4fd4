use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use nexus_core::{
    config::GithubConfig, error::truncate_body, DispatchOutcome, JobInputs, TriggerDispatcher,
    WorkflowJob,
};
use nexus_lifecycle::{JobHistoryProvider, WorkflowRun};
use nexus_services::{DeclarationFileProvider, DeclaredFile};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{GithubError, Result};

/// Error bodies are cut to this many characters before logging.
const MAX_ERROR_BODY: usize = 200;
const ACCEPT: &str = "application/vnd.github.v3+json";

/// REST client for the repository that hosts the stack's workflows and its
/// declarative services file.
pub struct GithubClient {
    http: reqwest::Client,
    config: GithubConfig,
}

#[derive(Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: Option<String>,
    sha: String,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            tail
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header("Accept", ACCEPT)
    }

    fn workflow_file(&self, job: WorkflowJob) -> &str {
        let files = &self.config.workflows;
        match job {
            WorkflowJob::Deploy => &files.deploy,
            WorkflowJob::Teardown => &files.teardown,
            WorkflowJob::Destroy => &files.destroy,
            WorkflowJob::SpinUp => &files.spin_up,
        }
    }

    /// Read a failed response body, truncated, logging it with the status.
    async fn failure_body(resp: reqwest::Response, what: &str) -> (u16, String) {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let body = truncate_body(&text, MAX_ERROR_BODY);
        warn!(status, body = %body, "GitHub {what} failed");
        (status, body)
    }

    /// POST a `workflow_dispatch` event. Only 204 counts as accepted.
    pub async fn dispatch_workflow(
        &self,
        job: WorkflowJob,
        inputs: &JobInputs,
    ) -> Result<DispatchOutcome> {
        let file = self.workflow_file(job);
        let url = self.repo_url(&format!("actions/workflows/{file}/dispatches"));
        let body = json!({ "ref": self.config.branch, "inputs": inputs });

        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            info!(job = %job, workflow = file, "workflow dispatched");
            return Ok(DispatchOutcome::Accepted);
        }
        let (status, reason) = Self::failure_body(resp, "workflow dispatch").await;
        Ok(DispatchOutcome::Rejected { status, reason })
    }

    /// Most recent runs across all workflows, newest first.
    pub async fn recent_runs(&self, limit: u32) -> Result<Vec<WorkflowRun>> {
        let url = self.repo_url(&format!("actions/runs?per_page={limit}"));
        let resp = self.request(reqwest::Method::GET, &url).send().await?;
        if !resp.status().is_success() {
            let (status, body) = Self::failure_body(resp, "run listing").await;
            return Err(GithubError::Api { status, body });
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| GithubError::Payload(e.to_string()))?;
        let runs = payload
            .get("workflow_runs")
            .filter(|v| v.is_array())
            .cloned()
            .ok_or_else(|| GithubError::Payload("missing workflow_runs array".into()))?;
        let runs: Vec<WorkflowRun> =
            serde_json::from_value(runs).map_err(|e| GithubError::Payload(e.to_string()))?;
        debug!(count = runs.len(), "workflow runs fetched");
        Ok(runs)
    }

    /// Fetch a repository file via the contents API, decoded.
    pub async fn get_file(&self, path: &str) -> Result<DeclaredFile> {
        let url = self.repo_url(&format!("contents/{path}"));
        let resp = self
            .request(reqwest::Method::GET, &url)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            let (status, body) = Self::failure_body(resp, "file fetch").await;
            return Err(GithubError::Api { status, body });
        }

        let file: ContentsResponse = resp
            .json()
            .await
            .map_err(|e| GithubError::Payload(e.to_string()))?;
        // the API wraps base64 at 60 columns
        let packed: String = file
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| GithubError::Payload(format!("content is not base64: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| GithubError::Payload(format!("content is not UTF-8: {e}")))?;

        Ok(DeclaredFile {
            content,
            version: file.sha,
        })
    }

    /// Write a file, conditional on it still being at `sha`.
    pub async fn put_file(&self, path: &str, content: &str, sha: &str, message: &str) -> Result<()> {
        let url = self.repo_url(&format!("contents/{path}"));
        let body = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "sha": sha,
            "branch": self.config.branch,
        });
        let resp = self
            .request(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await?;

        match resp.status().as_u16() {
            200 | 201 => {
                info!(path, message, "file committed");
                Ok(())
            }
            409 | 422 => {
                let (status, body) = Self::failure_body(resp, "file write").await;
                Err(GithubError::Conflict { status, body })
            }
            _ => {
                let (status, body) = Self::failure_body(resp, "file write").await;
                Err(GithubError::Api { status, body })
            }
        }
    }
}

#[async_trait]
impl TriggerDispatcher for GithubClient {
    async fn dispatch(
        &self,
        job: WorkflowJob,
        inputs: JobInputs,
    ) -> nexus_core::Result<DispatchOutcome> {
        Ok(self.dispatch_workflow(job, &inputs).await?)
    }
}

#[async_trait]
impl JobHistoryProvider for GithubClient {
    async fn list_recent_runs(&self, limit: u32) -> nexus_core::Result<Vec<WorkflowRun>> {
        Ok(self.recent_runs(limit).await?)
    }
}

#[async_trait]
impl DeclarationFileProvider for GithubClient {
    async fn fetch(&self, path: &str) -> nexus_core::Result<DeclaredFile> {
        Ok(self.get_file(path).await?)
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected_version: &str,
        message: &str,
    ) -> nexus_core::Result<()> {
        Ok(self.put_file(path, content, expected_version, message).await?)
    }
}
