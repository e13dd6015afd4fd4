//! `nexus-scheduler`: timezone-aware scheduled teardown.
//!
//! # Overview
//!
//! Settings live in the key/value Config Store and are re-read on every
//! tick. The [`engine::TeardownScheduler`] is invoked once per minute; it
//! compares the current UTC minute against the notification and teardown
//! wall-clock times converted out of the configured IANA zone.
//!
//! | Outcome              | When                                             |
//! |----------------------|--------------------------------------------------|
//! | `Disabled`           | scheduled teardown switched off                  |
//! | `Delayed`            | `delay_until` still in the future                |
//! | `Notified`           | current minute == notification minute           |
//! | `NotificationMuted`  | same, with `notify_on_shutdown` off              |
//! | `TeardownDispatched` | current minute == teardown minute                |
//! | `Idle`               | anything else                                    |
//!
//! Matching is minute-exact. A tick that does not run during the configured
//! minute skips that day's action.

pub mod engine;
pub mod error;
pub mod notifications;
pub mod schedule;
pub mod settings;
pub mod types;

pub use engine::{
    first_tick_at, plan_tick, LogNotifier, Notifier, TeardownScheduler, TickAction, TickOutcome,
    TICK_OFFSET_SECS,
};
pub use error::{Result, SchedulerError};
pub use notifications::{NotificationPrefs, PrefsUpdate};
pub use schedule::{next_occurrence, resolve_next_teardown};
pub use settings::SettingsUpdate;
pub use types::{NextTeardown, SchedulerConfig, TeardownReminder, TimeRemaining, WallClock};
