//! Delivery log
//!
//! Records every delivery attempt made by the coordinator, successful or
//! not, so failed hand-offs stay visible after the schedule has advanced.

use crate::schedule::{ReportFormat, Schedule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of entries kept in memory
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

/// One delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEntry {
    pub id: String,
    pub schedule_id: String,
    pub report_name: String,
    pub format: ReportFormat,

    /// The scheduled instant that fired
    pub scheduled_for: DateTime<Utc>,

    /// Poll time of the attempt
    pub attempted_at: DateTime<Utc>,

    pub outcome: DeliveryOutcome,
    pub recipients: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryEntry {
    pub fn delivered(schedule: &Schedule, scheduled_for: DateTime<Utc>, attempted_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            schedule_id: schedule.id.clone(),
            report_name: schedule.report_name.clone(),
            format: schedule.format,
            scheduled_for,
            attempted_at,
            outcome: DeliveryOutcome::Delivered,
            recipients: schedule.recipients.clone(),
            error: None,
        }
    }

    pub fn failed(
        schedule: &Schedule,
        scheduled_for: DateTime<Utc>,
        attempted_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            outcome: DeliveryOutcome::Failed,
            error: Some(error.into()),
            ..Self::delivered(schedule, scheduled_for, attempted_at)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == DeliveryOutcome::Failed
    }
}

/// Bounded, oldest-first collection of delivery attempts
#[derive(Debug, Clone)]
pub struct DeliveryLog {
    entries: Vec<DeliveryEntry>,
    max_entries: usize,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max.max(1),
        }
    }

    pub fn log(&mut self, entry: DeliveryEntry) {
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let drain_count = self.entries.len() - self.max_entries;
            self.entries.drain(0..drain_count);
        }
    }

    pub fn entries(&self) -> &[DeliveryEntry] {
        &self.entries
    }

    pub fn entries_since(&self, since: DateTime<Utc>) -> Vec<&DeliveryEntry> {
        self.entries
            .iter()
            .filter(|e| e.attempted_at >= since)
            .collect()
    }

    pub fn entries_for_schedule(&self, schedule_id: &str) -> Vec<&DeliveryEntry> {
        self.entries
            .iter()
            .filter(|e| e.schedule_id == schedule_id)
            .collect()
    }

    pub fn failures(&self) -> Vec<&DeliveryEntry> {
        self.entries.iter().filter(|e| e.is_failure()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Export as JSON Lines
    pub fn to_jsonl(&self) -> String {
        self.entries
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn stats(&self) -> DeliveryStats {
        let total = self.entries.len();
        let failed = self.entries.iter().filter(|e| e.is_failure()).count();

        DeliveryStats {
            total,
            delivered: total - failed,
            failed,
            failure_rate: if total > 0 { failed as f64 / total as f64 } else { 0.0 },
        }
    }
}

impl Default for DeliveryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    pub failure_rate: f64,
}
