//! Alarm records as stored in the remote datastore.
//!
//! The wire shape under `devices/{deviceId}/alarms/{alarmId}` is camelCase
//! JSON; the record never carries its own id, since the tree key is the id.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_LABEL_LEN: usize = 50;

/// Seven per-day repeat flags, week order starting Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepeatDays {
    #[serde(default)]
    pub sun: bool,
    #[serde(default)]
    pub mon: bool,
    #[serde(default)]
    pub tue: bool,
    #[serde(default)]
    pub wed: bool,
    #[serde(default)]
    pub thu: bool,
    #[serde(default)]
    pub fri: bool,
    #[serde(default)]
    pub sat: bool,
}

impl RepeatDays {
    fn flags(&self) -> [(bool, &'static str); 7] {
        [
            (self.sun, "Sun"),
            (self.mon, "Mon"),
            (self.tue, "Tue"),
            (self.wed, "Wed"),
            (self.thu, "Thu"),
            (self.fri, "Fri"),
            (self.sat, "Sat"),
        ]
    }

    pub fn active_count(&self) -> usize {
        self.flags().iter().filter(|(on, _)| *on).count()
    }
}

/// Human-readable summary of a repeat schedule.
pub fn format_repeat_days(repeat: &RepeatDays) -> String {
    let active = repeat.active_count();

    if active == 7 {
        return "Daily".to_string();
    }

    let weekdays = repeat.mon && repeat.tue && repeat.wed && repeat.thu && repeat.fri;
    if weekdays && !repeat.sat && !repeat.sun {
        return "Weekdays".to_string();
    }

    if repeat.sat && repeat.sun && active == 2 {
        return "Weekends".to_string();
    }

    if active == 0 {
        return "Once".to_string();
    }

    repeat
        .flags()
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Stored value of one alarm, without its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    /// `"HH:mm"`, 24-hour.
    pub time: String,
    pub label: String,
    pub repeat: RepeatDays,
    pub enabled: bool,
    /// Whether the wake-up challenge gates stopping this alarm. Older
    /// records may omit it.
    #[serde(default)]
    pub wake_up_game: bool,
}

impl AlarmRecord {
    /// Field-level validation, applied before any write reaches the store.
    pub fn validate(&self) -> Result<(), AlarmValidationError> {
        parse_time_of_day(&self.time)?;
        if self.label.chars().count() > MAX_LABEL_LEN {
            return Err(AlarmValidationError::LabelTooLong {
                max: MAX_LABEL_LEN,
            });
        }
        Ok(())
    }
}

/// An alarm as seen by the client: record plus its backend-assigned key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: String,
    pub record: AlarmRecord,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlarmValidationError {
    #[error("time must be HH:mm, got {0:?}")]
    MalformedTime(String),
    #[error("label must be at most {max} characters")]
    LabelTooLong { max: usize },
}

/// Parse an `"HH:mm"` time-of-day string into (hour, minute).
pub fn parse_time_of_day(s: &str) -> Result<(u8, u8), AlarmValidationError> {
    let malformed = || AlarmValidationError::MalformedTime(s.to_string());

    let (h, m) = s.split_once(':').ok_or_else(malformed)?;
    if h.len() != 2 || m.len() != 2 {
        return Err(malformed());
    }
    let hour: u8 = h.parse().map_err(|_| malformed())?;
    let minute: u8 = m.parse().map_err(|_| malformed())?;
    if hour > 23 || minute > 59 {
        return Err(malformed());
    }
    Ok((hour, minute))
}
