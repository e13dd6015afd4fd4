use thiserror::Error;

/// Cross-crate error taxonomy. Every component error is folded into one of
/// these before it reaches the HTTP boundary.
#[derive(Debug, Error)]
pub enum NexusError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not configured")]
    NotConfigured(String),

    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { status: Option<u16>, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("Cannot disable core service: {name}")]
    CoreServiceProtected { name: String },

    #[error("Service not found: {name}")]
    ServiceNotFound { name: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NexusError {
    /// Short error code string, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            NexusError::Validation(_) => "VALIDATION_ERROR",
            NexusError::NotConfigured(_) => "NOT_CONFIGURED",
            NexusError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            NexusError::Conflict(_) => "CONFLICT",
            NexusError::CoreServiceProtected { .. } => "CORE_SERVICE_PROTECTED",
            NexusError::ServiceNotFound { .. } => "SERVICE_NOT_FOUND",
            NexusError::NotFound(_) => "NOT_FOUND",
            NexusError::Config(_) => "CONFIG_ERROR",
            NexusError::Database(_) => "DATABASE_ERROR",
            NexusError::Serialization(_) => "SERIALIZATION_ERROR",
            NexusError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the error renders with at the gateway boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            NexusError::Validation(_) | NexusError::Serialization(_) => 400,
            NexusError::CoreServiceProtected { .. } => 403,
            NexusError::ServiceNotFound { .. } | NexusError::NotFound(_) => 404,
            NexusError::Conflict(_) => 409,
            NexusError::UpstreamUnavailable { .. } => 502,
            NexusError::NotConfigured(_)
            | NexusError::Config(_)
            | NexusError::Database(_)
            | NexusError::Internal(_) => 500,
        }
    }

    /// Whether the caller may re-fetch and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NexusError::Conflict(_) | NexusError::UpstreamUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, NexusError>;

/// Cap a response body for logs and error messages.
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_protection_is_client_error() {
        let err = NexusError::CoreServiceProtected {
            name: "control".to_string(),
        };
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_string(), "Cannot disable core service: control");
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflict_is_retryable() {
        assert!(NexusError::Conflict("sha mismatch".into()).is_retryable());
        assert_eq!(NexusError::Conflict("x".into()).status_code(), 409);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_body("héllo", 2), "hé");
        assert_eq!(truncate_body("short", 200), "short");
    }
}
