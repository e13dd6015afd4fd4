use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nexus_core::NexusError;
use nexus_scheduler::SchedulerError;
use nexus_services::ServiceError;
use nexus_store::StoreError;
use serde_json::json;

/// Handler error: any component error, rendered as
/// `{"success": false, "error": ..., "code": ...}` with its mapped status.
#[derive(Debug)]
pub struct ApiError(pub NexusError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match &self.0 {
            NexusError::UpstreamUnavailable { status: upstream, message } => {
                tracing::warn!(?upstream, %message, "upstream call failed");
            }
            e if status.is_server_error() => tracing::error!("request failed: {e}"),
            e => tracing::debug!(code = e.code(), "request rejected: {e}"),
        }

        let body = json!({
            "success": false,
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<NexusError> for ApiError {
    fn from(e: NexusError) -> Self {
        Self(e)
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        Self(e.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
