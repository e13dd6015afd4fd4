use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{
    error::{Result, SchedulerError},
    types::{NextTeardown, SchedulerConfig, TimeRemaining, WallClock},
};

/// Display abbreviations for the zones operators commonly pick. Anything not
/// listed is shown as UTC.
pub static TIMEZONE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Europe/Zurich", "CET"),
    ("America/New_York", "EST"),
    ("America/Los_Angeles", "PST"),
];

pub fn timezone_abbr(timezone: &str) -> &'static str {
    TIMEZONE_ABBREVIATIONS
        .iter()
        .find(|(name, _)| *name == timezone)
        .map(|(_, abbr)| *abbr)
        .unwrap_or("UTC")
}

/// Absolute instant at which `time` occurs on `date` in `tz`.
///
/// The wall-clock is first read as if it were UTC, then rendered back into
/// `tz`; the minute discrepancy between what was wanted and what came out is
/// applied to the candidate. A second pass settles candidates that crossed an
/// offset change. Nonexistent local times (spring-forward gaps) resolve to an
/// instant one offset step away from the requested wall-clock.
pub fn instant_on_date(time: WallClock, tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let desired = NaiveDateTime::new(date, time.as_naive_time());
    let mut candidate = Utc.from_utc_datetime(&desired);

    for _ in 0..2 {
        let rendered = candidate.with_timezone(&tz).naive_local();
        let drift = (desired - rendered).num_minutes();
        if drift == 0 {
            break;
        }
        candidate += Duration::minutes(drift);
    }
    candidate
}

/// Instant of `time` on the calendar day that `base` falls on in `tz`.
pub fn instant_today(time: WallClock, tz: Tz, base: DateTime<Utc>) -> DateTime<Utc> {
    instant_on_date(time, tz, base.with_timezone(&tz).date_naive())
}

/// Next occurrence of `time` in `tz` strictly after `now`.
pub fn next_occurrence(time: WallClock, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let today = now.with_timezone(&tz).date_naive();
    let candidate = instant_on_date(time, tz, today);
    if candidate > now {
        return Ok(candidate);
    }
    let tomorrow = today.succ_opt().ok_or(SchedulerError::OutOfRange)?;
    Ok(instant_on_date(time, tz, tomorrow))
}

/// Effective teardown deadline: the next natural occurrence, pushed out to
/// `delay_until` when that is later. A delay never brings the deadline
/// forward.
pub fn resolve_next_teardown(
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Result<NextTeardown> {
    if !config.enabled {
        return Ok(NextTeardown {
            next_teardown: None,
            time_remaining: None,
        });
    }

    let natural = next_occurrence(config.teardown_time, config.timezone, now)?;
    let deadline = match config.delay_until {
        Some(delay) if delay > natural => delay,
        _ => natural,
    };

    Ok(NextTeardown {
        next_teardown: Some(deadline),
        time_remaining: Some(TimeRemaining::between(now, deadline)),
    })
}
