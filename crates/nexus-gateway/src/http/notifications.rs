//! Notification preferences: GET/POST /api/email-settings
//!
//! Response: `{ "success": true, "settings": { "notifyOnShutdown": bool, "notifyOnSpinup": bool } }`

use std::sync::Arc;

use axum::{extract::State, Json};
use nexus_core::NexusError;
use nexus_scheduler::{notifications, NotificationPrefs, PrefsUpdate};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::http::error::ApiResult;

fn envelope(prefs: NotificationPrefs) -> Json<Value> {
    Json(json!({ "success": true, "settings": prefs }))
}

pub async fn get_preferences(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    Ok(envelope(notifications::load(state.settings.as_ref())?))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let update = parse_update(&body)?;
    let prefs = notifications::apply(state.settings.as_ref(), &update)?;
    tracing::info!(
        notify_on_shutdown = prefs.notify_on_shutdown,
        notify_on_spinup = prefs.notify_on_spinup,
        "notification preferences updated"
    );
    Ok(envelope(prefs))
}

fn parse_update(body: &Value) -> Result<PrefsUpdate, NexusError> {
    let flag = |key: &str| match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(NexusError::Validation(format!("{key} must be true or false"))),
    };
    if !(body.is_object() || body.is_null()) {
        return Err(NexusError::Validation("body must be a JSON object".into()));
    }
    Ok(PrefsUpdate {
        notify_on_shutdown: flag("notifyOnShutdown")?,
        notify_on_spinup: flag("notifyOnSpinup")?,
    })
}
