//! GitHub binding for the control plane: workflow dispatch, run history and
//! the contents API, behind the collaborator traits the other crates define.

pub mod client;
pub mod error;

pub use client::GithubClient;
pub use error::{GithubError, Result};
