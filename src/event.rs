//! Scheduled event records.
//!
//! The record is the collaborator-visible shape of a scheduled event: a
//! name, a wall-clock time (`HH:mm:ss.SSS`), a date (`yyyy-MM-dd`) and a
//! few flags. Resolution to an epoch target happens through chrono in
//! local time; any malformed field resolves to `None` and the record is
//! treated as absent.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use log::warn;
use serde::{Deserialize, Serialize};

const TIME_FORMAT: &str = "%H:%M:%S%.3f";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EventRecord {
    pub name: String,
    /// Target wall-clock time, `HH:mm:ss.SSS`.
    pub time: String,
    /// Target date, `yyyy-MM-dd`.
    pub date: String,
    pub enabled: bool,
    pub sound: bool,
    pub vibration: bool,
    pub description: String,
}

impl Default for EventRecord {
    fn default() -> Self {
        EventRecord {
            name: String::new(),
            time: "00:00:00.000".to_string(),
            date: String::new(),
            enabled: true,
            sound: true,
            vibration: false,
            description: String::new(),
        }
    }
}

impl EventRecord {
    /// Resolves date + time to Unix epoch milliseconds in local time.
    /// `None` on any malformed field or a nonexistent local time (DST gap).
    pub fn target_epoch_millis(&self) -> Option<i64> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()?;
        let time = NaiveTime::parse_from_str(&self.time, TIME_FORMAT).ok()?;
        let naive = NaiveDateTime::new(date, time);
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
    }

    /// Parses a persisted record; malformed data is treated as absent.
    pub fn from_json(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("[Event] Discarding malformed record: {}", e);
                None
            }
        }
    }
}

/// Resolves `HH:mm:ss.SSS` against the date of `now`, for targets
/// scheduled "today".
pub fn target_today(time: &str, now: DateTime<Local>) -> Option<i64> {
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT).ok()?;
    let naive = NaiveDateTime::new(now.date_naive(), time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}
