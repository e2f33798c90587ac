//! Scheduled reports and their active/paused lifecycle
use crate::recurrence::compute_next_occurrence;
use crate::rule::{Frequency, ScheduleSpec};
use chrono::{DateTime, Datelike, Duration, Utc};
use qs_core::{QsError, Record, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format of a scheduled report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Pdf,
    Excel,
    EmailSummary,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "excel",
            ReportFormat::EmailSummary => "email_summary",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleState {
    Active,
    Paused,
}

/// Split a comma separated address list, trimming blanks
pub fn parse_recipients(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fields a user supplies when creating a schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchedule {
    pub report_name: String,
    pub schedule: ScheduleSpec,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub format: ReportFormat,
}

/// A recurring report delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub report_name: String,
    pub schedule: ScheduleSpec,
    pub recipients: Vec<String>,
    pub format: ReportFormat,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub created_date: DateTime<Utc>,
}

impl Schedule {
    /// Validate and create an active schedule whose first run is strictly
    /// after `now`
    pub fn create(draft: NewSchedule, now: DateTime<Utc>) -> Result<Self> {
        if draft.report_name.trim().is_empty() {
            return Err(QsError::InvalidSpec("report name is required".to_string()));
        }
        let recipients = normalize_recipients(draft.recipients)?;
        let spec = anchored(draft.schedule, now);
        let next_run = compute_next_occurrence(&spec, now)?;

        tracing::debug!(
            report = %draft.report_name,
            rule = %spec.describe(),
            next_run = %next_run,
            "schedule created"
        );

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            report_name: draft.report_name,
            schedule: spec,
            recipients,
            format: draft.format,
            active: true,
            last_run: None,
            next_run,
            created_date: now,
        })
    }

    pub fn state(&self) -> ScheduleState {
        if self.active {
            ScheduleState::Active
        } else {
            ScheduleState::Paused
        }
    }

    pub fn describe(&self) -> String {
        self.schedule.describe()
    }

    /// Active and `next_run` has been reached
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_run <= now
    }

    /// Stop firing; `next_run` is kept as is
    pub fn pause(&mut self) -> Result<()> {
        if !self.active {
            return Err(QsError::InvalidState(format!("schedule {} already paused", self.id)));
        }
        self.active = false;
        Ok(())
    }

    /// Start firing again from the first occurrence after `now`
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.active {
            return Err(QsError::InvalidState(format!("schedule {} already active", self.id)));
        }
        self.next_run = compute_next_occurrence(&self.schedule, now)?;
        self.active = true;
        Ok(())
    }

    /// Toggle to the requested state; a no-op when already there
    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) -> Result<()> {
        match (self.active, active) {
            (true, false) => self.pause(),
            (false, true) => self.resume(now),
            _ => Ok(()),
        }
    }

    /// Record a firing of the scheduled instant and move to the next one.
    ///
    /// `last_run` becomes the scheduled instant rather than `now`, so late
    /// polls do not drift the cadence. Returns the instant that fired.
    pub fn fire(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if !self.active {
            return Err(QsError::InvalidState(format!("schedule {} is paused", self.id)));
        }
        if now < self.next_run {
            return Err(QsError::InvalidState(format!(
                "schedule {} not due until {}",
                self.id, self.next_run
            )));
        }
        let fired = self.next_run;
        self.next_run = compute_next_occurrence(&self.schedule, fired)?;
        self.last_run = Some(fired);
        Ok(fired)
    }

    /// Jump `next_run` past `now`, dropping missed occurrences
    pub fn skip_missed(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.next_run <= now {
            self.next_run = compute_next_occurrence(&self.schedule, now)?;
        }
        Ok(())
    }

    /// Replace the recurrence rule and recompute from `now`
    pub fn update_spec(&mut self, spec: ScheduleSpec, now: DateTime<Utc>) -> Result<()> {
        let spec = anchored(spec, self.created_date);
        let next_run = compute_next_occurrence(&spec, now)?;
        self.schedule = spec;
        self.next_run = next_run;
        Ok(())
    }

    pub fn update_recipients(&mut self, recipients: Vec<String>) -> Result<()> {
        self.recipients = normalize_recipients(recipients)?;
        Ok(())
    }

    /// Time left until the next run, zero when due
    pub fn time_until_next(&self, now: DateTime<Utc>) -> Duration {
        (self.next_run - now).max(Duration::zero())
    }
}

impl Record for Schedule {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }
}

/// Quarterly rules without an anchor take the local month of `reference`
fn anchored(mut spec: ScheduleSpec, reference: DateTime<Utc>) -> ScheduleSpec {
    if spec.frequency == Frequency::Quarterly && spec.anchor_month.is_none() {
        let local = reference + Duration::minutes(i64::from(spec.utc_offset_minutes));
        spec.anchor_month = Some(local.month());
    }
    spec
}

/// Trim, drop blanks and duplicates; at least one address must remain
fn normalize_recipients(recipients: Vec<String>) -> Result<Vec<String>> {
    let mut clean: Vec<String> = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            continue;
        }
        if !recipient.contains('@') {
            return Err(QsError::InvalidSpec(format!(
                "recipient '{}' is not an email address",
                recipient
            )));
        }
        if !clean.iter().any(|r| r.eq_ignore_ascii_case(recipient)) {
            clean.push(recipient.to_string());
        }
    }
    if clean.is_empty() {
        return Err(QsError::InvalidSpec("at least one recipient is required".to_string()));
    }
    Ok(clean)
}
