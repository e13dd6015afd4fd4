//! Notification preferences, stored next to the scheduler settings.
//!
//! Values are the strings `"true"`/`"false"`; anything other than `"true"`
//! reads as off. Both preferences default to on.

use nexus_store::KvStore;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

pub const KEY_NOTIFY_ON_SHUTDOWN: &str = "notify_on_shutdown";
pub const KEY_NOTIFY_ON_SPINUP: &str = "notify_on_spinup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPrefs {
    /// Send the reminder ahead of a scheduled teardown.
    pub notify_on_shutdown: bool,
    pub notify_on_spinup: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            notify_on_shutdown: true,
            notify_on_spinup: true,
        }
    }
}

/// A partial preferences change. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefsUpdate {
    pub notify_on_shutdown: Option<bool>,
    pub notify_on_spinup: Option<bool>,
}

fn flag(store: &dyn KvStore, key: &str) -> Result<bool> {
    Ok(store.get(key)?.map_or(true, |v| v == "true"))
}

pub fn load(store: &dyn KvStore) -> Result<NotificationPrefs> {
    Ok(NotificationPrefs {
        notify_on_shutdown: flag(store, KEY_NOTIFY_ON_SHUTDOWN)?,
        notify_on_spinup: flag(store, KEY_NOTIFY_ON_SPINUP)?,
    })
}

/// Persist `update` and return the resulting preferences.
pub fn apply(store: &dyn KvStore, update: &PrefsUpdate) -> Result<NotificationPrefs> {
    let writes = [
        (KEY_NOTIFY_ON_SHUTDOWN, update.notify_on_shutdown),
        (KEY_NOTIFY_ON_SPINUP, update.notify_on_spinup),
    ];
    for (key, value) in writes {
        if let Some(on) = value {
            store.put(key, if on { "true" } else { "false" })?;
        }
    }
    debug!(?update, "notification preferences updated");
    load(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_store::MemoryKv;

    #[test]
    fn both_default_on() {
        let store = MemoryKv::new();
        assert_eq!(load(&store).unwrap(), NotificationPrefs::default());
    }

    #[test]
    fn only_literal_true_reads_as_on() {
        let store = MemoryKv::new();
        store.put(KEY_NOTIFY_ON_SHUTDOWN, "yes").unwrap();
        store.put(KEY_NOTIFY_ON_SPINUP, "true").unwrap();
        let prefs = load(&store).unwrap();
        assert!(!prefs.notify_on_shutdown);
        assert!(prefs.notify_on_spinup);
    }

    #[test]
    fn partial_update_leaves_other_flag() {
        let store = MemoryKv::new();
        let prefs = apply(
            &store,
            &PrefsUpdate {
                notify_on_spinup: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(prefs.notify_on_shutdown);
        assert!(!prefs.notify_on_spinup);
        assert_eq!(store.get(KEY_NOTIFY_ON_SHUTDOWN).unwrap(), None);
        assert_eq!(store.get(KEY_NOTIFY_ON_SPINUP).unwrap().as_deref(), Some("false"));
    }
}
