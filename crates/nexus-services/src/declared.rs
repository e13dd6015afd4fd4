use async_trait::async_trait;
use tracing::info;

use crate::{
    error::{Result, ServiceError},
    parser::{parse_services, update_service_field, BoolField, ServiceDefinition},
};

/// The declaration file as fetched, with the version token needed to write
/// it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredFile {
    /// Decoded file text.
    pub content: String,
    pub version: String,
}

/// Remote home of the declarative services file.
///
/// `write` is conditional on `expected_version`; a stale version must fail
/// with `NexusError::Conflict`.
#[async_trait]
pub trait DeclarationFileProvider: Send + Sync {
    async fn fetch(&self, path: &str) -> nexus_core::Result<DeclaredFile>;

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected_version: &str,
        message: &str,
    ) -> nexus_core::Result<()>;
}

/// Fetch and parse the current declarations.
pub async fn load_definitions(
    provider: &dyn DeclarationFileProvider,
    path: &str,
) -> Result<Vec<ServiceDefinition>> {
    let file = provider.fetch(path).await?;
    Ok(parse_services(&file.content))
}

/// Flip a service's `enabled` line in the declaration file itself.
///
/// Core services cannot be disabled here either. Returns the commit message
/// used for the write.
pub async fn toggle_declared(
    provider: &dyn DeclarationFileProvider,
    path: &str,
    service: &str,
    enabled: bool,
) -> Result<String> {
    let file = provider.fetch(path).await?;
    let defs = parse_services(&file.content);
    if !enabled && defs.iter().any(|d| d.name == service && d.core) {
        return Err(ServiceError::CoreServiceProtected(service.to_string()));
    }

    let updated = update_service_field(&file.content, service, BoolField::Enabled, enabled)?;
    let message = format!(
        "chore: {} {service}",
        if enabled { "enable" } else { "disable" }
    );
    provider
        .write(path, &updated, &file.version, &message)
        .await?;
    info!(service, enabled, version = %file.version, "declaration file updated");
    Ok(message)
}
