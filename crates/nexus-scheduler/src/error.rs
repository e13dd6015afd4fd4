use nexus_core::NexusError;
use nexus_store::StoreError;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A wall-clock time supplied by the caller is not `HH:MM`.
    #[error("{field} must be in HH:MM format (e.g., \"22:00\"), got {value:?}")]
    InvalidTime { field: &'static str, value: String },

    /// The timezone is not a known IANA zone name.
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),

    /// Delay requests must be a positive, finite number of hours.
    #[error("delayHours must be a positive number, got {0}")]
    InvalidDelay(f64),

    /// A persisted setting could not be parsed back.
    #[error("stored setting {key} is invalid: {value:?}")]
    CorruptSetting { key: &'static str, value: String },

    /// Date arithmetic left chrono's representable range.
    #[error("date out of range")]
    OutOfRange,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The teardown dispatch could not be delivered.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] NexusError),

    #[error("notification failed: {0}")]
    Notify(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

impl From<SchedulerError> for NexusError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::InvalidTime { .. }
            | SchedulerError::InvalidTimezone(_)
            | SchedulerError::InvalidDelay(_) => NexusError::Validation(e.to_string()),
            SchedulerError::Store(inner) => inner.into(),
            SchedulerError::Dispatch(inner) => inner,
            other => NexusError::Internal(other.to_string()),
        }
    }
}
