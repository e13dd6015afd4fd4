//! `nexus-services`: declared services, their stored desired/deployed
//! state, and the reconciliation between the two.

pub mod db;
pub mod declared;
pub mod error;
pub mod parser;
pub mod reconciler;
pub mod store;

pub use declared::{load_definitions, toggle_declared, DeclarationFileProvider, DeclaredFile};
pub use error::{Result, ServiceError};
pub use parser::{parse_services, update_service_field, BoolField, ParseError, ServiceDefinition};
pub use reconciler::{
    InitReport, ServiceListing, ServiceReconciler, ServiceView, ToggleOutcome, ToggleRequest,
};
pub use store::{KvServiceStore, ServiceRow, ServiceStore, SqliteServiceStore};
