use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use nexus_core::{dispatch, DispatchOutcome, TriggerDispatcher, WorkflowJob};
use nexus_store::KvStore;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::{
    error::Result,
    notifications,
    schedule::{instant_today, next_occurrence, timezone_abbr},
    settings,
    types::{SchedulerConfig, TeardownReminder},
};

/// Receives the reminder fired at notification time.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, reminder: &TeardownReminder) -> Result<()>;
}

/// Notifier that only writes the reminder to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, reminder: &TeardownReminder) -> Result<()> {
        info!(
            teardown_at = %reminder.teardown_at,
            timezone = %reminder.timezone,
            "{}",
            reminder.message()
        );
        Ok(())
    }
}

/// What a tick decided to do, before any side effect runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    Disabled,
    Delayed {
        until: DateTime<Utc>,
        hours_remaining: i64,
    },
    Notify(TeardownReminder),
    Teardown,
    /// Neither configured minute matched. Carries the UTC (hour, minute) of
    /// both targets for the log line.
    Idle {
        notify_utc: (u32, u32),
        teardown_utc: (u32, u32),
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickPlan {
    /// The stored delay has passed and must be deleted.
    pub clear_delay: bool,
    pub action: TickAction,
}

/// Pure decision step of a tick.
///
/// Matching is on the exact UTC hour and minute: a tick that does not run
/// during the configured minute skips that day's action entirely.
pub fn plan_tick(config: &SchedulerConfig, now: DateTime<Utc>) -> Result<TickPlan> {
    if !config.enabled {
        return Ok(TickPlan {
            clear_delay: false,
            action: TickAction::Disabled,
        });
    }

    let mut clear_delay = false;
    if let Some(until) = config.delay_until {
        if now < until {
            let secs = (until - now).num_seconds();
            return Ok(TickPlan {
                clear_delay: false,
                action: TickAction::Delayed {
                    until,
                    hours_remaining: (secs + 3599) / 3600,
                },
            });
        }
        clear_delay = true;
    }

    let notify_at = instant_today(config.notification_time, config.timezone, now);
    let teardown_at = instant_today(config.teardown_time, config.timezone, now);
    let current = (now.hour(), now.minute());
    let notify_utc = (notify_at.hour(), notify_at.minute());
    let teardown_utc = (teardown_at.hour(), teardown_at.minute());

    let action = if current == notify_utc {
        TickAction::Notify(TeardownReminder {
            teardown_time: config.teardown_time,
            timezone: config.timezone.name().to_string(),
            timezone_abbr: timezone_abbr(config.timezone.name()),
            teardown_at: next_occurrence(config.teardown_time, config.timezone, now)?,
        })
    } else if current == teardown_utc {
        TickAction::Teardown
    } else {
        TickAction::Idle {
            notify_utc,
            teardown_utc,
        }
    };

    Ok(TickPlan {
        clear_delay,
        action,
    })
}

/// Seconds past the minute at which recurring ticks fire. Keeps a slightly
/// late timer inside the minute it was meant for.
pub const TICK_OFFSET_SECS: i64 = 2;

/// First tick instant at or after `now` that sits `offset` past a UTC minute
/// boundary.
pub fn first_tick_at(now: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    let minute_start = now
        - Duration::seconds(i64::from(now.second()))
        - Duration::nanoseconds(i64::from(now.nanosecond()));
    let candidate = minute_start + offset;
    if candidate >= now {
        candidate
    } else {
        candidate + Duration::minutes(1)
    }
}

/// Observable result of a tick, after side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Disabled,
    Delayed { until: DateTime<Utc> },
    Notified,
    /// Notification minute reached with shutdown notifications switched off.
    NotificationMuted,
    TeardownDispatched(DispatchOutcome),
    Idle,
}

/// Scheduled teardown driver. Holds no state between ticks; everything it
/// needs is re-read from the store each time.
pub struct TeardownScheduler {
    store: Arc<dyn KvStore>,
    dispatcher: Arc<dyn TriggerDispatcher>,
    notifier: Arc<dyn Notifier>,
}

impl TeardownScheduler {
    pub fn new(
        store: Arc<dyn KvStore>,
        dispatcher: Arc<dyn TriggerDispatcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            notifier,
        }
    }

    /// One scheduler check at `now`. `cron` is only reported in the log.
    pub async fn tick(&self, now: DateTime<Utc>, cron: &str) -> Result<TickOutcome> {
        let config = settings::load(self.store.as_ref())?;
        let plan = plan_tick(&config, now)?;

        if plan.clear_delay {
            settings::clear_delay(self.store.as_ref())?;
            info!("delay period expired, teardown will proceed");
        }

        match plan.action {
            TickAction::Disabled => {
                info!("scheduled teardown is disabled");
                Ok(TickOutcome::Disabled)
            }
            TickAction::Delayed {
                until,
                hours_remaining,
            } => {
                info!(%until, hours_remaining, "scheduled teardown is delayed");
                Ok(TickOutcome::Delayed { until })
            }
            TickAction::Notify(reminder) => {
                info!(%now, cron, "notification time reached");
                if !notifications::load(self.store.as_ref())?.notify_on_shutdown {
                    info!("shutdown notifications are off, reminder not sent");
                    return Ok(TickOutcome::NotificationMuted);
                }
                self.notifier.notify(&reminder).await?;
                Ok(TickOutcome::Notified)
            }
            TickAction::Teardown => {
                info!(%now, cron, "teardown time reached");
                let outcome = self
                    .dispatcher
                    .dispatch(
                        WorkflowJob::Teardown,
                        dispatch::inputs([("confirm", "TEARDOWN")]),
                    )
                    .await?;
                match &outcome {
                    DispatchOutcome::Accepted => info!("teardown workflow triggered"),
                    DispatchOutcome::Rejected { status, reason } => {
                        warn!(status, %reason, "teardown workflow rejected")
                    }
                }
                Ok(TickOutcome::TeardownDispatched(outcome))
            }
            TickAction::Idle {
                notify_utc,
                teardown_utc,
            } => {
                tracing::debug!(
                    notify = %format!("{:02}:{:02}", notify_utc.0, notify_utc.1),
                    teardown = %format!("{:02}:{:02}", teardown_utc.0, teardown_utc.1),
                    "not notification or teardown time (UTC)"
                );
                Ok(TickOutcome::Idle)
            }
        }
    }

    /// Tick that never fails: errors are logged and dropped so the recurring
    /// trigger keeps running.
    pub async fn tick_logged(&self, now: DateTime<Utc>, cron: &str) -> Option<TickOutcome> {
        match self.tick(now, cron).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("scheduled teardown tick failed: {e}");
                None
            }
        }
    }

    /// Tick every `every` until `shutdown` broadcasts `true`.
    pub async fn run(
        self: Arc<Self>,
        every: std::time::Duration,
        cron: String,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let now = Utc::now();
        let first = first_tick_at(now, Duration::seconds(TICK_OFFSET_SECS));
        let wait = (first - now).to_std().unwrap_or_default();
        info!(every_secs = every.as_secs(), %cron, %first, "teardown scheduler started");
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + wait, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_logged(Utc::now(), &cron).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("teardown scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use crate::settings::{KEY_DELAY_UNTIL, KEY_TIMEZONE};
    use chrono::TimeZone;
    use nexus_core::JobInputs;
    use nexus_store::MemoryKv;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        calls: Mutex<Vec<(WorkflowJob, JobInputs)>>,
    }

    #[async_trait]
    impl TriggerDispatcher for RecordingDispatcher {
        async fn dispatch(
            &self,
            job: WorkflowJob,
            inputs: JobInputs,
        ) -> nexus_core::Result<DispatchOutcome> {
            self.calls.lock().unwrap().push((job, inputs));
            Ok(DispatchOutcome::Accepted)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        reminders: Mutex<Vec<TeardownReminder>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, reminder: &TeardownReminder) -> Result<()> {
            self.reminders.lock().unwrap().push(reminder.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _reminder: &TeardownReminder) -> Result<()> {
            Err(SchedulerError::Notify("mail relay down".to_string()))
        }
    }

    struct Harness {
        store: Arc<MemoryKv>,
        dispatcher: Arc<RecordingDispatcher>,
        notifier: Arc<RecordingNotifier>,
        scheduler: TeardownScheduler,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryKv::new());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = TeardownScheduler::new(store.clone(), dispatcher.clone(), notifier.clone());
        Harness {
            store,
            dispatcher,
            notifier,
            scheduler,
        }
    }

    // Defaults: Europe/Zurich, notify 21:45, teardown 22:00. In January that
    // is 20:45 and 21:00 UTC.
    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 20, h, m, s).unwrap()
    }

    #[tokio::test]
    async fn tick_outside_configured_minutes_is_noop() {
        let h = harness();
        let outcome = h.scheduler.tick(at(12, 0, 0), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::Idle);
        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
        assert!(h.notifier.reminders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notification_minute_notifies_once_without_dispatch() {
        let h = harness();
        let outcome = h.scheduler.tick(at(20, 45, 30), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::Notified);
        let reminders = h.notifier.reminders.lock().unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].timezone_abbr, "CET");
        assert_eq!(reminders[0].teardown_at, at(21, 0, 0));
        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn muted_shutdown_notifications_skip_notifier() {
        let h = harness();
        h.store
            .put(notifications::KEY_NOTIFY_ON_SHUTDOWN, "false")
            .unwrap();
        let outcome = h.scheduler.tick(at(20, 45, 2), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::NotificationMuted);
        assert!(h.notifier.reminders.lock().unwrap().is_empty());

        // teardown itself is unaffected
        let outcome = h.scheduler.tick(at(21, 0, 2), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::TeardownDispatched(DispatchOutcome::Accepted));
    }

    #[tokio::test]
    async fn teardown_minute_dispatches_teardown() {
        let h = harness();
        let outcome = h.scheduler.tick(at(21, 0, 5), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::TeardownDispatched(DispatchOutcome::Accepted));
        let calls = h.dispatcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, WorkflowJob::Teardown);
        assert_eq!(calls[0].1.get("confirm").map(String::as_str), Some("TEARDOWN"));
    }

    #[tokio::test]
    async fn one_minute_late_misses_teardown() {
        let h = harness();
        let outcome = h.scheduler.tick(at(21, 1, 0), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::Idle);
        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn active_delay_blocks_teardown() {
        let h = harness();
        let until = at(21, 0, 0) + Duration::hours(3);
        h.store.put(KEY_DELAY_UNTIL, &until.to_rfc3339()).unwrap();
        let outcome = h.scheduler.tick(at(21, 0, 0), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::Delayed { until });
        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
        // delay still in place
        assert!(h.store.get(KEY_DELAY_UNTIL).unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_delay_is_cleared_and_tick_proceeds() {
        let h = harness();
        let until = at(20, 0, 0);
        h.store.put(KEY_DELAY_UNTIL, &until.to_rfc3339()).unwrap();
        let outcome = h.scheduler.tick(at(21, 0, 0), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::TeardownDispatched(DispatchOutcome::Accepted));
        assert_eq!(h.store.get(KEY_DELAY_UNTIL).unwrap(), None);
    }

    #[tokio::test]
    async fn disabled_scheduler_does_nothing() {
        let h = harness();
        h.store.put(settings::KEY_ENABLED, "false").unwrap();
        let outcome = h.scheduler.tick(at(21, 0, 0), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::Disabled);
        assert!(h.dispatcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn same_minute_is_idempotent_decision() {
        let h = harness();
        let config = settings::load(h.store.as_ref()).unwrap();
        let a = plan_tick(&config, at(21, 0, 1)).unwrap();
        let b = plan_tick(&config, at(21, 0, 59)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.action, TickAction::Teardown);
    }

    #[test]
    fn first_tick_lands_inside_the_next_minute() {
        let offset = Duration::seconds(TICK_OFFSET_SECS);
        let almost = at(20, 59, 59) + Duration::milliseconds(950);
        assert_eq!(first_tick_at(almost, offset), at(21, 0, 2));
        assert_eq!(first_tick_at(at(21, 0, 1), offset), at(21, 0, 2));
        assert_eq!(first_tick_at(at(21, 0, 2), offset), at(21, 0, 2));
        assert_eq!(first_tick_at(at(21, 0, 3), offset), at(21, 1, 2));
    }

    #[tokio::test]
    async fn timezone_change_moves_utc_target() {
        let h = harness();
        h.store.put(KEY_TIMEZONE, "America/New_York").unwrap();
        // 22:00 EST == 03:00 UTC next day; the tick on 2026-01-20 03:00 UTC
        // is 22:00 on the 19th in New York, so "today" there is the 19th.
        let outcome = h.scheduler.tick(at(3, 0, 0), "* * * * *").await.unwrap();
        assert_eq!(outcome, TickOutcome::TeardownDispatched(DispatchOutcome::Accepted));
    }

    #[tokio::test]
    async fn failed_side_effect_is_swallowed_by_logged_tick() {
        let store = Arc::new(MemoryKv::new());
        let scheduler = TeardownScheduler::new(
            store,
            Arc::new(RecordingDispatcher::default()),
            Arc::new(FailingNotifier),
        );
        assert!(scheduler.tick(at(20, 45, 0), "cron").await.is_err());
        assert_eq!(scheduler.tick_logged(at(20, 45, 0), "cron").await, None);
    }
}
