//! Recurrence rules
//!
//! A [`ScheduleSpec`] says when a report fires: a frequency, the day within
//! the week or month where that applies, and a local wall-clock time at a
//! fixed UTC offset.

use chrono::{NaiveTime, Weekday};
use qs_core::{QsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted distance from UTC, in minutes
pub const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    pub fn to_chrono(self) -> Weekday {
        match self {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local wall-clock time, written "HH:MM"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(QsError::InvalidSpec(format!(
                "time of day {:02}:{:02} out of range",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn to_naive(self) -> NaiveTime {
        // hour and minute are range-checked on construction
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self { hour: 8, minute: 0 }
    }
}

impl FromStr for TimeOfDay {
    type Err = QsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || QsError::InvalidSpec(format!("time of day '{}' is not HH:MM", s));
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u32>().map_err(|_| invalid())?;
        let minute = minute.parse::<u32>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = QsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> String {
        time.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// When a recurring report fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    pub frequency: Frequency,

    /// Required for weekly schedules, ignored otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayOfWeek>,

    /// Required for monthly schedules; quarterly schedules default to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,

    #[serde(default, alias = "time")]
    pub time_of_day: TimeOfDay,

    /// Fixed local offset from UTC; daylight saving is not modelled
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// First month of the quarterly cycle (1-12). Filled from the creation
    /// month when a schedule is created; calendar quarters when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_month: Option<u32>,
}

impl ScheduleSpec {
    pub fn daily(time_of_day: TimeOfDay) -> Self {
        Self {
            frequency: Frequency::Daily,
            day_of_week: None,
            day_of_month: None,
            time_of_day,
            utc_offset_minutes: 0,
            anchor_month: None,
        }
    }

    pub fn weekly(day: DayOfWeek, time_of_day: TimeOfDay) -> Self {
        Self {
            frequency: Frequency::Weekly,
            day_of_week: Some(day),
            ..Self::daily(time_of_day)
        }
    }

    pub fn monthly(day: u32, time_of_day: TimeOfDay) -> Self {
        Self {
            frequency: Frequency::Monthly,
            day_of_month: Some(day),
            ..Self::daily(time_of_day)
        }
    }

    pub fn quarterly(anchor_month: u32, time_of_day: TimeOfDay) -> Self {
        Self {
            frequency: Frequency::Quarterly,
            anchor_month: Some(anchor_month),
            ..Self::daily(time_of_day)
        }
    }

    pub fn with_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Check the rule is complete for its frequency
    pub fn validate(&self) -> Result<()> {
        match self.frequency {
            Frequency::Daily => {}
            Frequency::Weekly => {
                if self.day_of_week.is_none() {
                    return Err(QsError::InvalidSpec(
                        "weekly schedule needs a day of week".to_string(),
                    ));
                }
            }
            Frequency::Monthly => match self.day_of_month {
                Some(day) => check_day_of_month(day)?,
                None => {
                    return Err(QsError::InvalidSpec(
                        "monthly schedule needs a day of month".to_string(),
                    ))
                }
            },
            Frequency::Quarterly => {
                if let Some(day) = self.day_of_month {
                    check_day_of_month(day)?;
                }
                if let Some(month) = self.anchor_month {
                    if !(1..=12).contains(&month) {
                        return Err(QsError::InvalidSpec(format!(
                            "anchor month {} outside 1-12",
                            month
                        )));
                    }
                }
            }
        }

        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(QsError::InvalidSpec(format!(
                "utc offset {} minutes beyond +/-18h",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Human readable rule, e.g. "Every monday at 08:00"
    pub fn describe(&self) -> String {
        match self.frequency {
            Frequency::Daily => format!("Daily at {}", self.time_of_day),
            Frequency::Weekly => match self.day_of_week {
                Some(day) => format!("Every {} at {}", day, self.time_of_day),
                None => format!("Weekly at {}", self.time_of_day),
            },
            Frequency::Monthly => match self.day_of_month {
                Some(day) => format!("Monthly on day {} at {}", day, self.time_of_day),
                None => format!("Monthly at {}", self.time_of_day),
            },
            Frequency::Quarterly => format!("Quarterly at {}", self.time_of_day),
        }
    }
}

fn check_day_of_month(day: u32) -> Result<()> {
    if (1..=31).contains(&day) {
        Ok(())
    } else {
        Err(QsError::InvalidSpec(format!("day of month {} outside 1-31", day)))
    }
}
