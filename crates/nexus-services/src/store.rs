use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use nexus_store::{KvStore, Result, StoreError};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{db::init_db, parser::ServiceDefinition};

/// Persisted per-service state: desired `enabled`, actual `deployed`, plus
/// the metadata copied from the last declaration sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRow {
    pub name: String,
    pub enabled: bool,
    pub deployed: bool,
    pub subdomain: String,
    pub port: u32,
    pub public: bool,
    pub core: bool,
    pub description: String,
    pub updated_at: String,
}

impl ServiceRow {
    /// Fresh row for a newly declared service: desired and deployed both
    /// start at the declared default.
    pub fn from_definition(def: &ServiceDefinition) -> Self {
        Self {
            name: def.name.clone(),
            enabled: def.default_enabled,
            deployed: def.default_enabled,
            subdomain: def.subdomain.clone(),
            port: def.port,
            public: def.public,
            core: def.core,
            description: def.description.clone(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    /// Copy metadata from `def`, keeping `enabled` and `deployed`.
    pub fn refresh_metadata(&mut self, def: &ServiceDefinition) {
        self.subdomain = def.subdomain.clone();
        self.port = def.port;
        self.public = def.public;
        self.core = def.core;
        self.description = def.description.clone();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// Relational half of the Config Store contract.
pub trait ServiceStore: Send + Sync {
    fn select_all(&self) -> Result<Vec<ServiceRow>>;
    fn upsert(&self, row: &ServiceRow) -> Result<()>;
    fn delete(&self, name: &str) -> Result<()>;

    fn select(&self, name: &str) -> Result<Option<ServiceRow>> {
        Ok(self.select_all()?.into_iter().find(|r| r.name == name))
    }

    /// Set `deployed = enabled` on every row; returns the number of rows.
    fn mark_all_deployed(&self) -> Result<usize> {
        let rows = self.select_all()?;
        for mut row in rows.iter().cloned() {
            row.deployed = row.enabled;
            row.touch();
            self.upsert(&row)?;
        }
        Ok(rows.len())
    }
}

/// `ServiceStore` over the SQLite `services` table.
pub struct SqliteServiceStore {
    conn: Mutex<Connection>,
}

impl SqliteServiceStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

const SELECT_COLUMNS: &str =
    "SELECT name, enabled, deployed, subdomain, port, public, core, description, updated_at
     FROM services";

fn row_from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServiceRow> {
    Ok(ServiceRow {
        name: row.get(0)?,
        enabled: row.get(1)?,
        deployed: row.get(2)?,
        subdomain: row.get(3)?,
        port: row.get(4)?,
        public: row.get(5)?,
        core: row.get(6)?,
        description: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl ServiceStore for SqliteServiceStore {
    fn select_all(&self) -> Result<Vec<ServiceRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY name"))?;
        let rows = stmt
            .query_map([], row_from_sql)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn select(&self, name: &str) -> Result<Option<ServiceRow>> {
        use rusqlite::OptionalExtension;
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE name = ?1"),
                [name],
                row_from_sql,
            )
            .optional()?;
        Ok(row)
    }

    fn upsert(&self, row: &ServiceRow) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO services
                 (name, enabled, deployed, subdomain, port, public, core, description, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(name) DO UPDATE SET
                 enabled = excluded.enabled,
                 deployed = excluded.deployed,
                 subdomain = excluded.subdomain,
                 port = excluded.port,
                 public = excluded.public,
                 core = excluded.core,
                 description = excluded.description,
                 updated_at = excluded.updated_at",
            params![
                row.name,
                row.enabled,
                row.deployed,
                row.subdomain,
                row.port,
                row.public,
                row.core,
                row.description,
                row.updated_at,
            ],
        )?;
        debug!(
            service = %row.name,
            enabled = row.enabled,
            deployed = row.deployed,
            "service row stored"
        );
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM services WHERE name = ?1", [name])?;
        Ok(())
    }

    fn mark_all_deployed(&self) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE services SET deployed = enabled, updated_at = ?1",
            [Utc::now().to_rfc3339()],
        )?;
        Ok(changed)
    }
}

/// Key under which [`KvServiceStore`] keeps its rows.
pub const SERVICES_KEY: &str = "services";

/// `ServiceStore` kept as one JSON array inside a [`KvStore`], for
/// deployments without the relational table.
pub struct KvServiceStore<K> {
    kv: K,
}

impl<K: KvStore> KvServiceStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    fn save(&self, rows: &[ServiceRow]) -> Result<()> {
        let json =
            serde_json::to_string(rows).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.put(SERVICES_KEY, &json)
    }
}

impl<K: KvStore> ServiceStore for KvServiceStore<K> {
    fn select_all(&self) -> Result<Vec<ServiceRow>> {
        match self.kv.get(SERVICES_KEY)? {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    fn upsert(&self, row: &ServiceRow) -> Result<()> {
        let mut rows = self.select_all()?;
        match rows.iter_mut().find(|r| r.name == row.name) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
        self.save(&rows)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut rows = self.select_all()?;
        rows.retain(|r| r.name != name);
        self.save(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_store::MemoryKv;

    fn def(name: &str, enabled: bool) -> ServiceDefinition {
        ServiceDefinition {
            name: name.into(),
            default_enabled: enabled,
            port: 80,
            ..Default::default()
        }
    }

    fn exercise(store: &dyn ServiceStore) {
        assert!(store.select_all().unwrap().is_empty());

        let mut a = ServiceRow::from_definition(&def("a", true));
        store.upsert(&a).unwrap();
        store
            .upsert(&ServiceRow::from_definition(&def("b", false)))
            .unwrap();
        assert_eq!(store.select_all().unwrap().len(), 2);

        a.enabled = false;
        store.upsert(&a).unwrap();
        let stored = store.select("a").unwrap().unwrap();
        assert!(!stored.enabled);
        assert!(stored.deployed);

        assert_eq!(store.mark_all_deployed().unwrap(), 2);
        for row in store.select_all().unwrap() {
            assert_eq!(row.deployed, row.enabled, "{}", row.name);
        }

        store.delete("a").unwrap();
        assert_eq!(store.select("a").unwrap(), None);
        assert_eq!(store.select_all().unwrap().len(), 1);
    }

    #[test]
    fn sqlite_service_store() {
        exercise(&SqliteServiceStore::new(Connection::open_in_memory().unwrap()).unwrap());
    }

    #[test]
    fn kv_service_store() {
        exercise(&KvServiceStore::new(MemoryKv::new()));
    }

    #[test]
    fn refresh_metadata_keeps_state() {
        let mut row = ServiceRow::from_definition(&def("a", true));
        row.enabled = false;
        let mut newer = def("a", true);
        newer.port = 9090;
        newer.core = true;
        row.refresh_metadata(&newer);
        assert_eq!(row.port, 9090);
        assert!(row.core);
        assert!(!row.enabled);
        assert!(row.deployed);
    }
}
