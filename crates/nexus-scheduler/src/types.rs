use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

static HHMM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-1][0-9]|2[0-3]):[0-5][0-9]$").expect("static regex"));

/// A validated `HH:MM` wall-clock time (24h).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WallClock {
    hour: u32,
    minute: u32,
}

impl WallClock {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // hour/minute are range-checked at construction
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallClock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !HHMM.is_match(s) {
            return Err(format!("invalid HH:MM time: {s:?}"));
        }
        let (h, m) = s.split_once(':').ok_or_else(|| format!("invalid HH:MM time: {s:?}"))?;
        let hour = h.parse().map_err(|_| format!("invalid hour in {s:?}"))?;
        let minute = m.parse().map_err(|_| format!("invalid minute in {s:?}"))?;
        Ok(Self { hour, minute })
    }
}

impl From<WallClock> for String {
    fn from(w: WallClock) -> Self {
        w.to_string()
    }
}

impl TryFrom<String> for WallClock {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Resolved scheduler settings: stored values merged over defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub enabled: bool,
    #[serde(serialize_with = "serialize_tz")]
    pub timezone: Tz,
    pub teardown_time: WallClock,
    pub notification_time: WallClock,
    /// Manual postponement. May be stale (in the past) when read.
    pub delay_until: Option<DateTime<Utc>>,
}

fn serialize_tz<S: Serializer>(tz: &Tz, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(tz.name())
}

/// Time left until a deadline, floored to whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRemaining {
    pub hours: i64,
    pub minutes: i64,
    pub total_minutes: i64,
}

impl TimeRemaining {
    pub fn between(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        // num_minutes truncates toward zero, which is floor once clamped
        let total = (deadline - now).num_minutes().max(0);
        Self {
            hours: total / 60,
            minutes: total % 60,
            total_minutes: total,
        }
    }
}

/// The effective teardown deadline. Both fields are `None` when scheduled
/// teardown is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTeardown {
    pub next_teardown: Option<DateTime<Utc>>,
    pub time_remaining: Option<TimeRemaining>,
}

/// Payload of the notify side effect fired at notification time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeardownReminder {
    pub teardown_time: WallClock,
    pub timezone: String,
    pub timezone_abbr: &'static str,
    pub teardown_at: DateTime<Utc>,
}

impl TeardownReminder {
    pub fn message(&self) -> String {
        format!(
            "Scheduled teardown at {} {}: infrastructure will be torn down automatically unless disabled.",
            self.teardown_time, self.timezone_abbr
        )
    }
}
