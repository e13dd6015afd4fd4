use std::sync::Arc;

use axum::{extract::State, Json};
use nexus_services::{load_definitions, ServiceDefinition, ToggleRequest};
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::http::error::ApiResult;

/// Current declarations from the services file.
pub(crate) async fn declared(state: &AppState) -> ApiResult<Vec<ServiceDefinition>> {
    let github = state.github()?;
    Ok(load_definitions(github.files.as_ref(), &github.services_path).await?)
}

/// GET /api/services: declared services with desired/deployed state.
pub async fn list_services(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let defs = declared(&state).await?;
    let listing = state.services.list_services(&defs)?;
    Ok(Json(json!({
        "success": true,
        "services": listing.services,
        "pendingChangesCount": listing.pending_changes_count,
    })))
}

/// POST /api/services: `{service, enabled}`; records desired state only.
pub async fn toggle_service(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request = ToggleRequest::from_json(&body)?;
    let defs = declared(&state).await?;
    let outcome = state.services.set_enabled(&defs, &request)?;
    Ok(Json(json!({
        "success": true,
        "service": outcome.service,
        "enabled": outcome.enabled,
        "pendingChangesCount": outcome.pending_changes_count,
    })))
}

/// POST /api/services/init: sync stored rows with the declarations.
pub async fn init_services(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let defs = declared(&state).await?;
    let report = state.services.init_from_declared(&defs)?;
    Ok(Json(json!({
        "success": true,
        "message": format!(
            "Services initialized: {} created, {} updated, {} removed",
            report.created, report.updated, report.removed
        ),
        "services": report.services,
        "created": report.created,
        "updated": report.updated,
        "removed": report.removed,
    })))
}

/// POST /api/services/sync-deployed: called after a successful spin-up.
pub async fn sync_deployed(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let rows = state.services.sync_deployed()?;
    Ok(Json(json!({
        "success": true,
        "message": "Deployed state synced with enabled state",
        "rowsAffected": rows,
    })))
}

/// POST /api/services/declared: rewrite `enabled` in the services file
/// itself, then start a spin-up.
pub async fn toggle_declared(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request = ToggleRequest::from_json(&body)?;
    let github = state.github()?;
    let commit = nexus_services::toggle_declared(
        github.files.as_ref(),
        &github.services_path,
        &request.service,
        request.enabled,
    )
    .await?;
    info!(service = %request.service, %commit, "declaration committed");

    let enabled = crate::http::triggers::dispatch_spin_up(&state).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Service {} updated and spin-up triggered", request.service),
        "enabledServices": enabled,
    })))
}
