use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use nexus_core::NexusError;
use nexus_scheduler::{
    resolve_next_teardown, settings, NextTeardown, SchedulerConfig, SettingsUpdate,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::app::AppState;
use crate::http::error::ApiResult;

#[derive(Serialize)]
struct ScheduleView {
    #[serde(flatten)]
    config: SchedulerConfig,
    #[serde(flatten)]
    next: NextTeardown,
}

/// GET /api/scheduled-teardown: settings plus the effective next deadline.
pub async fn get_schedule(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let config = settings::load(state.settings.as_ref())?;
    let next = resolve_next_teardown(&config, Utc::now())?;
    Ok(Json(json!({
        "success": true,
        "config": ScheduleView { config, next },
    })))
}

/// POST /api/scheduled-teardown: partial update; absent fields unchanged.
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let update = parse_update(&body)?;
    let config = settings::apply(state.settings.as_ref(), &update, Utc::now())?;
    tracing::info!(
        enabled = config.enabled,
        timezone = config.timezone.name(),
        teardown = %config.teardown_time,
        "scheduled teardown settings updated"
    );
    Ok(Json(json!({
        "success": true,
        "config": config,
        "message": "Configuration updated successfully",
    })))
}

/// JSON types are checked here; value validation happens in `settings::apply`.
fn parse_update(body: &Value) -> Result<SettingsUpdate, NexusError> {
    let empty = Map::new();
    let fields = match body {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(NexusError::Validation("body must be a JSON object".into())),
    };
    let present = |key: &str| fields.get(key).filter(|v| !v.is_null());

    let enabled = match present("enabled") {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => return Err(NexusError::Validation("enabled must be true or false".into())),
    };
    let text = |key: &str| -> Result<Option<String>, NexusError> {
        match present(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(NexusError::Validation(format!("{key} must be a string"))),
        }
    };
    let delay_hours = match present("delayHours") {
        None => None,
        Some(v) => Some(v.as_f64().ok_or_else(|| {
            NexusError::Validation("delayHours must be a number".into())
        })?),
    };

    Ok(SettingsUpdate {
        enabled,
        timezone: text("timezone")?,
        teardown_time: text("teardownTime")?,
        notification_time: text("notificationTime")?,
        delay_hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_must_be_boolean() {
        let err = parse_update(&json!({ "enabled": "yes" })).unwrap_err();
        assert_eq!(err.to_string(), "enabled must be true or false");
    }

    #[test]
    fn empty_strings_are_absent() {
        let update = parse_update(&json!({ "teardownTime": "", "timezone": null })).unwrap();
        assert_eq!(update, SettingsUpdate::default());
    }

    #[test]
    fn fields_are_mapped() {
        let update = parse_update(&json!({
            "enabled": true,
            "timezone": "America/New_York",
            "teardownTime": "23:00",
            "notificationTime": "22:30",
            "delayHours": 2
        }))
        .unwrap();
        assert_eq!(update.enabled, Some(true));
        assert_eq!(update.timezone.as_deref(), Some("America/New_York"));
        assert_eq!(update.teardown_time.as_deref(), Some("23:00"));
        assert_eq!(update.notification_time.as_deref(), Some("22:30"));
        assert_eq!(update.delay_hours, Some(2.0));
    }

    #[test]
    fn non_object_body_rejected() {
        assert!(parse_update(&json!([1, 2])).is_err());
        assert!(parse_update(&json!({ "delayHours": "soon" })).is_err());
    }
}
