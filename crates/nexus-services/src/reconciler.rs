use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{Result, ServiceError},
    parser::ServiceDefinition,
    store::{ServiceRow, ServiceStore},
};

/// Effective state of one declared service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub name: String,
    pub enabled: bool,
    pub deployed: bool,
    /// Desired and deployed state disagree; a spin-up would change something.
    pub pending: bool,
    pub core: bool,
    pub subdomain: String,
    pub port: u32,
    pub public: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListing {
    pub services: Vec<ServiceView>,
    pub pending_changes_count: usize,
}

/// A validated `{service, enabled}` request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleRequest {
    pub service: String,
    pub enabled: bool,
}

impl ToggleRequest {
    /// Checks shape only: a non-empty string `service` and a boolean
    /// `enabled`. Whether the service exists is decided later.
    pub fn from_json(body: &Value) -> Result<Self> {
        let invalid = || {
            ServiceError::InvalidPayload("Expected { service: string, enabled: boolean }".into())
        };
        let service = body
            .get("service")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(invalid)?;
        let enabled = body
            .get("enabled")
            .and_then(Value::as_bool)
            .ok_or_else(invalid)?;
        Ok(Self {
            service: service.to_string(),
            enabled,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub service: String,
    pub enabled: bool,
    pub pending_changes_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitReport {
    /// Number of declared services.
    pub services: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Merges declared service definitions with stored desired/deployed state.
pub struct ServiceReconciler {
    store: Arc<dyn ServiceStore>,
}

impl ServiceReconciler {
    pub fn new(store: Arc<dyn ServiceStore>) -> Self {
        Self { store }
    }

    fn rows_by_name(&self) -> Result<HashMap<String, ServiceRow>> {
        Ok(self
            .store
            .select_all()?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect())
    }

    /// Every declared service with stored state, or its declared default when
    /// nothing is stored yet.
    pub fn list_services(&self, defs: &[ServiceDefinition]) -> Result<ServiceListing> {
        let rows = self.rows_by_name()?;
        let services: Vec<ServiceView> = defs
            .iter()
            .map(|def| {
                let (enabled, deployed) = rows
                    .get(&def.name)
                    .map(|r| (r.enabled, r.deployed))
                    .unwrap_or((def.default_enabled, def.default_enabled));
                ServiceView {
                    name: def.name.clone(),
                    enabled,
                    deployed,
                    pending: enabled != deployed,
                    core: def.core,
                    subdomain: def.subdomain.clone(),
                    port: def.port,
                    public: def.public,
                    description: def.description.clone(),
                }
            })
            .collect();
        let pending_changes_count = services.iter().filter(|s| s.pending).count();
        Ok(ServiceListing {
            services,
            pending_changes_count,
        })
    }

    /// Persist the desired state of one service. `deployed` is never touched.
    pub fn set_enabled(
        &self,
        defs: &[ServiceDefinition],
        request: &ToggleRequest,
    ) -> Result<ToggleOutcome> {
        let name = request.service.as_str();
        let def = defs
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;

        if def.core && !request.enabled {
            warn!(service = %name, "refusing to disable core service");
            return Err(ServiceError::CoreServiceProtected(name.to_string()));
        }

        let mut row = match self.store.select(name)? {
            Some(row) => row,
            None => ServiceRow::from_definition(def),
        };
        row.enabled = request.enabled;
        row.touch();
        self.store.upsert(&row)?;
        info!(service = %name, enabled = request.enabled, "service desired state updated");

        let listing = self.list_services(defs)?;
        Ok(ToggleOutcome {
            service: name.to_string(),
            enabled: request.enabled,
            pending_changes_count: listing.pending_changes_count,
        })
    }

    /// Bring stored rows in line with the declarations: new names are created
    /// from their defaults, existing rows get metadata only, undeclared rows
    /// are removed.
    pub fn init_from_declared(&self, defs: &[ServiceDefinition]) -> Result<InitReport> {
        let mut rows = self.rows_by_name()?;
        let mut report = InitReport {
            services: defs.len(),
            created: 0,
            updated: 0,
            removed: 0,
        };

        for def in defs {
            match rows.get_mut(&def.name) {
                Some(row) => {
                    row.refresh_metadata(def);
                    self.store.upsert(row)?;
                    report.updated += 1;
                }
                None => {
                    let row = ServiceRow::from_definition(def);
                    self.store.upsert(&row)?;
                    rows.insert(row.name.clone(), row);
                    report.created += 1;
                }
            }
        }

        let declared: HashSet<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        for name in rows.keys().filter(|n| !declared.contains(n.as_str())) {
            self.store.delete(name)?;
            report.removed += 1;
        }

        info!(
            created = report.created,
            updated = report.updated,
            removed = report.removed,
            "services initialised from declarations"
        );
        Ok(report)
    }

    /// Record that the last deployment applied every desired state.
    pub fn sync_deployed(&self) -> Result<usize> {
        let rows = self.store.mark_all_deployed()?;
        info!(rows, "deployed state synced with enabled state");
        Ok(rows)
    }

    /// Names of services whose effective desired state is enabled, in
    /// declaration order.
    pub fn enabled_services(&self, defs: &[ServiceDefinition]) -> Result<Vec<String>> {
        Ok(self
            .list_services(defs)?
            .services
            .into_iter()
            .filter(|s| s.enabled)
            .map(|s| s.name)
            .collect())
    }
}
