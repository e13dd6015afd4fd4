use nexus_core::NexusError;
use nexus_store::StoreError;
use thiserror::Error;

use crate::parser::ParseError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Cannot disable core service: {0}")]
    CoreServiceProtected(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upstream(#[from] NexusError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl From<ServiceError> for NexusError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidPayload(msg) => NexusError::Validation(msg),
            ServiceError::NotFound(name) => NexusError::ServiceNotFound { name },
            ServiceError::CoreServiceProtected(name) => NexusError::CoreServiceProtected { name },
            ServiceError::Parse(ParseError::NotFound(name)) => NexusError::ServiceNotFound { name },
            ServiceError::Parse(e @ ParseError::UpdateFailed { .. }) => {
                NexusError::Internal(e.to_string())
            }
            ServiceError::Store(e) => e.into(),
            ServiceError::Upstream(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_onto_http_taxonomy() {
        let cases = [
            (ServiceError::InvalidPayload("x".into()), 400),
            (ServiceError::NotFound("x".into()), 404),
            (ServiceError::CoreServiceProtected("x".into()), 403),
            (ServiceError::Parse(ParseError::NotFound("x".into())), 404),
            (ServiceError::Store(StoreError::Poisoned), 500),
            (ServiceError::Upstream(NexusError::Conflict("sha".into())), 409),
        ];
        for (err, status) in cases {
            let msg = err.to_string();
            assert_eq!(NexusError::from(err).status_code(), status, "{msg}");
        }
    }
}
