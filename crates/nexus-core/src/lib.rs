//! `nexus-core`: configuration, error taxonomy and the job dispatch seam
//! shared by every other crate in the workspace.

pub mod config;
pub mod dispatch;
pub mod error;

pub use dispatch::{DispatchOutcome, JobInputs, TriggerDispatcher, WorkflowJob};
pub use error::{NexusError, Result};
