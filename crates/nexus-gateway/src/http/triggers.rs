//! Pass-through triggers for the remote workflows.

use std::sync::Arc;

use axum::{extract::State, Json};
use nexus_core::{dispatch::inputs, DispatchOutcome, JobInputs, NexusError, WorkflowJob};
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::http::error::ApiResult;
use crate::http::services::declared;

async fn fire(state: &AppState, job: WorkflowJob, inputs: JobInputs) -> ApiResult<()> {
    let github = state.github()?;
    match github.dispatcher.dispatch(job, inputs).await? {
        DispatchOutcome::Accepted => {
            info!(%job, "workflow triggered");
            Ok(())
        }
        DispatchOutcome::Rejected { status, reason } => Err(NexusError::UpstreamUnavailable {
            status: Some(status),
            message: format!("Failed to trigger {job} workflow: {reason}"),
        }
        .into()),
    }
}

/// Dispatch spin-up with every effectively enabled service; returns the list.
pub(crate) async fn dispatch_spin_up(state: &AppState) -> ApiResult<Vec<String>> {
    let defs = declared(state).await?;
    let enabled = state.services.enabled_services(&defs)?;
    let list = enabled.join(",");
    fire(
        state,
        WorkflowJob::SpinUp,
        inputs([("enabled_services", list.as_str())]),
    )
    .await?;
    Ok(enabled)
}

/// POST /api/spin-up
pub async fn spin_up(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let enabled = dispatch_spin_up(&state).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Spin-up workflow triggered successfully",
        "enabledServices": enabled,
    })))
}

/// POST /api/teardown
pub async fn teardown(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    fire(&state, WorkflowJob::Teardown, inputs([("confirm", "TEARDOWN")])).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Teardown workflow triggered successfully",
    })))
}

/// POST /api/destroy
pub async fn destroy(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    fire(&state, WorkflowJob::Destroy, inputs([("confirm", "DESTROY")])).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Destroy workflow triggered successfully",
    })))
}
