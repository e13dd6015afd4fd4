use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use nexus_lifecycle::current_state;
use serde_json::json;

use crate::app::AppState;
use crate::http::error::ApiResult;

/// GET /api/status: infrastructure state inferred from recent workflow runs.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let github = state.github()?;
    let report =
        current_state(github.history.as_ref(), &github.classifier, github.run_limit).await?;

    Ok((
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        )],
        Json(json!({
            "success": true,
            "infraState": report.infra_state,
            "inProgress": report.in_progress,
            "workflows": report.workflows,
        })),
    ))
}
