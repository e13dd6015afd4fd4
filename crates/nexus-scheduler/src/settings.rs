//! Scheduler settings persisted in the key/value half of the Config Store.
//!
//! Every field resolves the same way: stored value if present, otherwise the
//! documented default from [`DEFAULTS`]. `delay_until` has no default.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use nexus_store::KvStore;
use tracing::{debug, info};

use crate::{
    error::{Result, SchedulerError},
    types::{SchedulerConfig, WallClock},
};

pub const KEY_ENABLED: &str = "teardown_enabled";
pub const KEY_TIMEZONE: &str = "teardown_timezone";
pub const KEY_TEARDOWN_TIME: &str = "teardown_time";
pub const KEY_NOTIFICATION_TIME: &str = "notification_time";
pub const KEY_DELAY_UNTIL: &str = "delay_until";

/// Defaults applied when a key has never been written.
pub static DEFAULTS: &[(&str, &str)] = &[
    (KEY_ENABLED, "true"),
    (KEY_TIMEZONE, "Europe/Zurich"),
    (KEY_TEARDOWN_TIME, "22:00"),
    (KEY_NOTIFICATION_TIME, "21:45"),
];

/// Stored value for `key`, falling back to its entry in [`DEFAULTS`].
fn resolve(store: &dyn KvStore, key: &'static str) -> Result<Option<String>> {
    let stored = store.get(key)?;
    Ok(stored.or_else(|| {
        DEFAULTS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }))
}

fn required(store: &dyn KvStore, key: &'static str) -> Result<String> {
    // every required key has a DEFAULTS entry, so None means a missing default
    resolve(store, key)?.ok_or(SchedulerError::CorruptSetting {
        key,
        value: String::new(),
    })
}

fn parse_stored<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T> {
    value
        .parse()
        .map_err(|_| SchedulerError::CorruptSetting { key, value })
}

/// Read the current settings, merged over defaults. Does not clear a stale
/// delay; see [`clear_delay`].
pub fn load(store: &dyn KvStore) -> Result<SchedulerConfig> {
    let enabled = required(store, KEY_ENABLED)? == "true";
    let timezone: Tz = parse_stored(KEY_TIMEZONE, required(store, KEY_TIMEZONE)?)?;
    let teardown_time: WallClock =
        parse_stored(KEY_TEARDOWN_TIME, required(store, KEY_TEARDOWN_TIME)?)?;
    let notification_time: WallClock =
        parse_stored(KEY_NOTIFICATION_TIME, required(store, KEY_NOTIFICATION_TIME)?)?;
    let delay_until = match resolve(store, KEY_DELAY_UNTIL)? {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| SchedulerError::CorruptSetting {
                    key: KEY_DELAY_UNTIL,
                    value: raw,
                })?,
        ),
        None => None,
    };

    Ok(SchedulerConfig {
        enabled,
        timezone,
        teardown_time,
        notification_time,
        delay_until,
    })
}

pub fn clear_delay(store: &dyn KvStore) -> Result<()> {
    store.delete(KEY_DELAY_UNTIL)?;
    Ok(())
}

/// A partial settings change. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub enabled: Option<bool>,
    pub timezone: Option<String>,
    pub teardown_time: Option<String>,
    pub notification_time: Option<String>,
    /// Postpone teardown to `now + delay_hours`.
    pub delay_hours: Option<f64>,
}

/// Validate then persist `update`, returning the resulting settings.
///
/// Validation happens before any write, so a rejected update leaves the
/// store unchanged. Disabling scheduled teardown also drops any pending
/// delay.
pub fn apply(
    store: &dyn KvStore,
    update: &SettingsUpdate,
    now: DateTime<Utc>,
) -> Result<SchedulerConfig> {
    if let Some(ref raw) = update.teardown_time {
        validate_time("teardownTime", raw)?;
    }
    if let Some(ref raw) = update.notification_time {
        validate_time("notificationTime", raw)?;
    }
    if let Some(ref tz) = update.timezone {
        tz.parse::<Tz>()
            .map_err(|_| SchedulerError::InvalidTimezone(tz.clone()))?;
    }
    let delay_until = match update.delay_hours {
        Some(hours) if hours.is_finite() && hours > 0.0 => {
            let millis = (hours * 3_600_000.0).round() as i64;
            let until = Duration::try_milliseconds(millis)
                .and_then(|d| now.checked_add_signed(d))
                .ok_or(SchedulerError::InvalidDelay(hours))?;
            Some(until)
        }
        Some(hours) => return Err(SchedulerError::InvalidDelay(hours)),
        None => None,
    };

    if let Some(until) = delay_until {
        store.put(KEY_DELAY_UNTIL, &until.to_rfc3339())?;
        info!(delay_until = %until, "scheduled teardown delayed");
    }
    if let Some(enabled) = update.enabled {
        store.put(KEY_ENABLED, if enabled { "true" } else { "false" })?;
        if !enabled {
            clear_delay(store)?;
        }
    }
    if let Some(ref tz) = update.timezone {
        store.put(KEY_TIMEZONE, tz)?;
    }
    if let Some(ref raw) = update.teardown_time {
        store.put(KEY_TEARDOWN_TIME, raw)?;
    }
    if let Some(ref raw) = update.notification_time {
        store.put(KEY_NOTIFICATION_TIME, raw)?;
    }
    debug!(?update, "scheduler settings updated");

    load(store)
}

fn validate_time(field: &'static str, raw: &str) -> Result<WallClock> {
    raw.parse().map_err(|_| SchedulerError::InvalidTime {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nexus_store::MemoryKv;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn first_read_uses_defaults() {
        let store = MemoryKv::new();
        let cfg = load(&store).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.timezone, chrono_tz::Europe::Zurich);
        assert_eq!(cfg.teardown_time.to_string(), "22:00");
        assert_eq!(cfg.notification_time.to_string(), "21:45");
        assert_eq!(cfg.delay_until, None);
    }

    #[test]
    fn stored_values_override_defaults() {
        let store = MemoryKv::new();
        store.put(KEY_ENABLED, "false").unwrap();
        store.put(KEY_TIMEZONE, "America/New_York").unwrap();
        store.put(KEY_TEARDOWN_TIME, "23:30").unwrap();
        let cfg = load(&store).unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.timezone, chrono_tz::America::New_York);
        assert_eq!(cfg.teardown_time.to_string(), "23:30");
        assert_eq!(cfg.notification_time.to_string(), "21:45");
    }

    #[test]
    fn corrupt_stored_time_is_reported() {
        let store = MemoryKv::new();
        store.put(KEY_TEARDOWN_TIME, "25:00").unwrap();
        let err = load(&store).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::CorruptSetting {
                key: KEY_TEARDOWN_TIME,
                ..
            }
        ));
    }

    #[test]
    fn delay_hours_sets_delay_until() {
        let store = MemoryKv::new();
        let update = SettingsUpdate {
            delay_hours: Some(2.5),
            ..Default::default()
        };
        let cfg = apply(&store, &update, now()).unwrap();
        assert_eq!(cfg.delay_until, Some(now() + Duration::minutes(150)));
    }

    #[test]
    fn disabling_clears_delay() {
        let store = MemoryKv::new();
        apply(
            &store,
            &SettingsUpdate {
                delay_hours: Some(4.0),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        let cfg = apply(
            &store,
            &SettingsUpdate {
                enabled: Some(false),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        assert!(!cfg.enabled);
        assert_eq!(cfg.delay_until, None);
    }

    #[test]
    fn invalid_update_leaves_store_untouched() {
        let store = MemoryKv::new();
        let update = SettingsUpdate {
            enabled: Some(false),
            teardown_time: Some("9:00".to_string()),
            ..Default::default()
        };
        let err = apply(&store, &update, now()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTime { field: "teardownTime", .. }));
        assert_eq!(store.get(KEY_ENABLED).unwrap(), None);
    }

    #[test]
    fn unknown_timezone_rejected() {
        let store = MemoryKv::new();
        let update = SettingsUpdate {
            timezone: Some("Mars/Olympus".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            apply(&store, &update, now()),
            Err(SchedulerError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn non_positive_delay_rejected() {
        let store = MemoryKv::new();
        for hours in [0.0, -1.0, f64::NAN] {
            let update = SettingsUpdate {
                delay_hours: Some(hours),
                ..Default::default()
            };
            assert!(apply(&store, &update, now()).is_err());
        }
        assert_eq!(store.get(KEY_DELAY_UNTIL).unwrap(), None);
    }
}
