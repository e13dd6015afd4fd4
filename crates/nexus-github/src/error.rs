use nexus_core::NexusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The conditional file write lost against a newer revision.
    #[error("file changed upstream ({status}): {body}")]
    Conflict { status: u16, body: String },

    #[error("unexpected payload: {0}")]
    Payload(String),
}

pub type Result<T> = std::result::Result<T, GithubError>;

impl From<GithubError> for NexusError {
    fn from(e: GithubError) -> Self {
        match e {
            GithubError::Http(err) => NexusError::UpstreamUnavailable {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            },
            GithubError::Api { status, body } => NexusError::UpstreamUnavailable {
                status: Some(status),
                message: body,
            },
            GithubError::Conflict { body, .. } => NexusError::Conflict(body),
            GithubError::Payload(msg) => NexusError::UpstreamUnavailable {
                status: None,
                message: msg,
            },
        }
    }
}
