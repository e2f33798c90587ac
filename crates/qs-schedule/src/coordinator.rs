//! Report delivery coordinator
//!
//! Polls the schedule store, fires whatever is due and hands the rendered
//! report to the delivery collaborator.
//!
//! Each firing first advances the stored schedule with a compare-and-set on
//! its previous `next_run`; only the poller that wins the swap delivers.
//! Delivery runs after the advance, so a failing recipient is logged but
//! never stalls later runs (at-most-once per scheduled instant).

use crate::delivery_log::{DeliveryEntry, DeliveryLog, DeliveryStats, DEFAULT_LOG_CAPACITY};
use crate::schedule::{ReportFormat, Schedule};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qs_core::{EntityStore, ListOrder, MemoryStore, QsError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Active schedules with `next_run <= now`, earliest first (ties by id)
pub fn due_schedules(now: DateTime<Utc>, schedules: &[Schedule]) -> Vec<Schedule> {
    let mut due: Vec<Schedule> = schedules
        .iter()
        .filter(|s| s.is_due(now))
        .cloned()
        .collect();
    due.sort_by(|a, b| a.next_run.cmp(&b.next_run).then_with(|| a.id.cmp(&b.id)));
    due
}

/// Schedule persistence as seen by the coordinator
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn list_schedules(&self) -> Result<Vec<Schedule>>;

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>>;

    /// Store `updated` only if the stored copy still has the `active`,
    /// `next_run` and `last_run` seen in `read`. Returns whether the write
    /// happened.
    async fn compare_and_set(&self, updated: &Schedule, read: &Schedule) -> Result<bool>;

    /// Store `updated` only if the stored copy is still active with
    /// `next_run == expected_next_run`. Returns whether the write happened.
    async fn compare_and_set_next_run(
        &self,
        updated: &Schedule,
        expected_next_run: DateTime<Utc>,
    ) -> Result<bool>;
}

#[async_trait]
impl ScheduleStore for MemoryStore<Schedule> {
    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        self.list(ListOrder::OldestFirst, None).await
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<Schedule>> {
        self.get(id).await
    }

    async fn compare_and_set(&self, updated: &Schedule, read: &Schedule) -> Result<bool> {
        self.replace_if(updated.clone(), |current| {
            current.active == read.active
                && current.next_run == read.next_run
                && current.last_run == read.last_run
        })
        .await
    }

    async fn compare_and_set_next_run(
        &self,
        updated: &Schedule,
        expected_next_run: DateTime<Utc>,
    ) -> Result<bool> {
        self.replace_if(updated.clone(), |current| {
            current.active && current.next_run == expected_next_run
        })
        .await
    }
}

/// Attempts before a toggle racing the poller gives up
const TOGGLE_ATTEMPTS: usize = 3;

/// Pause or resume a stored schedule.
///
/// The write is a compare-and-set against the copy that was read, so a
/// firing that lands in between is never overwritten by a stale `next_run`.
/// A toggle to the current state writes nothing.
pub async fn set_schedule_active(
    store: &dyn ScheduleStore,
    id: &str,
    active: bool,
    now: DateTime<Utc>,
) -> Result<Schedule> {
    for _ in 0..TOGGLE_ATTEMPTS {
        let read = store
            .get_schedule(id)
            .await?
            .ok_or_else(|| QsError::NotFound(format!("schedule {}", id)))?;
        if read.active == active {
            return Ok(read);
        }

        let mut updated = read.clone();
        updated.set_active(active, now)?;
        if store.compare_and_set(&updated, &read).await? {
            return Ok(updated);
        }
        tracing::debug!(schedule = %id, "schedule changed while toggling, rereading");
    }
    Err(QsError::InvalidState(format!(
        "schedule {} kept changing while toggling",
        id
    )))
}

/// A report ready for hand-off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedReport {
    pub title: String,
    pub format: ReportFormat,
    pub body: String,
    pub scheduled_for: DateTime<Utc>,
}

/// Produces the report content for a firing
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, schedule: &Schedule, scheduled_for: DateTime<Utc>) -> Result<RenderedReport>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub delivered_to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Sends a rendered report to the schedule's recipients (mail, file drop...)
#[async_trait]
pub trait ReportDelivery: Send + Sync {
    async fn deliver(&self, schedule: &Schedule, report: &RenderedReport) -> Result<DeliveryReceipt>;
}

/// What to do when a poll finds a schedule several occurrences behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUpPolicy {
    /// Fire once per poll until every missed occurrence has been delivered
    #[default]
    FireEach,
    /// Fire once, then jump past the missed occurrences
    SkipMissed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    pub catch_up: CatchUpPolicy,
    pub log_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            catch_up: CatchUpPolicy::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Outcome of one poll, by schedule id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    /// Schedules this poller advanced
    pub fired: Vec<String>,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
    /// Due schedules left alone (lost the race, paused meanwhile, store error)
    pub skipped: Vec<String>,
}

impl PollSummary {
    pub fn is_idle(&self) -> bool {
        self.fired.is_empty() && self.skipped.is_empty()
    }
}

pub struct DeliveryCoordinator {
    store: Arc<dyn ScheduleStore>,
    renderer: Arc<dyn ReportRenderer>,
    delivery: Arc<dyn ReportDelivery>,
    config: CoordinatorConfig,
    log: Mutex<DeliveryLog>,
}

impl DeliveryCoordinator {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        renderer: Arc<dyn ReportRenderer>,
        delivery: Arc<dyn ReportDelivery>,
    ) -> Self {
        Self::with_config(store, renderer, delivery, CoordinatorConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn ScheduleStore>,
        renderer: Arc<dyn ReportRenderer>,
        delivery: Arc<dyn ReportDelivery>,
        config: CoordinatorConfig,
    ) -> Self {
        let log = DeliveryLog::with_max_entries(config.log_capacity);
        Self {
            store,
            renderer,
            delivery,
            config,
            log: Mutex::new(log),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Fire and deliver every schedule due at `now`.
    ///
    /// Only a failure to list the store is returned as an error; per-schedule
    /// problems end up in the summary and the delivery log.
    pub async fn poll(&self, now: DateTime<Utc>) -> Result<PollSummary> {
        let schedules = self.store.list_schedules().await?;
        let mut summary = PollSummary::default();

        for schedule in due_schedules(now, &schedules) {
            let expected = schedule.next_run;
            let mut advanced = schedule.clone();

            let scheduled_for = match self.advance(&mut advanced, now) {
                Ok(instant) => instant,
                Err(e) => {
                    tracing::warn!(schedule = %schedule.id, error = %e, "cannot advance schedule");
                    summary.skipped.push(schedule.id);
                    continue;
                }
            };

            match self.store.compare_and_set_next_run(&advanced, expected).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(schedule = %schedule.id, "schedule already advanced elsewhere");
                    summary.skipped.push(schedule.id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(schedule = %schedule.id, error = %e, "schedule store rejected advance");
                    summary.skipped.push(schedule.id);
                    continue;
                }
            }
            summary.fired.push(advanced.id.clone());

            let entry = match self.render_and_deliver(&advanced, scheduled_for).await {
                Ok(receipt) => {
                    tracing::info!(
                        schedule = %advanced.id,
                        report = %advanced.report_name,
                        scheduled_for = %scheduled_for,
                        recipients = receipt.delivered_to.len(),
                        next_run = %advanced.next_run,
                        "report delivered"
                    );
                    summary.delivered.push(advanced.id.clone());
                    DeliveryEntry::delivered(&advanced, scheduled_for, now)
                }
                Err(e) => {
                    tracing::warn!(
                        schedule = %advanced.id,
                        report = %advanced.report_name,
                        scheduled_for = %scheduled_for,
                        error = %e,
                        "report delivery failed"
                    );
                    summary.failed.push(advanced.id.clone());
                    DeliveryEntry::failed(&advanced, scheduled_for, now, e.to_string())
                }
            };
            self.log.lock().await.log(entry);
        }

        if !summary.is_idle() {
            tracing::info!(
                fired = summary.fired.len(),
                delivered = summary.delivered.len(),
                failed = summary.failed.len(),
                skipped = summary.skipped.len(),
                "poll finished"
            );
        }
        Ok(summary)
    }

    fn advance(&self, schedule: &mut Schedule, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let fired = schedule.fire(now)?;
        if self.config.catch_up == CatchUpPolicy::SkipMissed {
            schedule.skip_missed(now)?;
        }
        Ok(fired)
    }

    async fn render_and_deliver(
        &self,
        schedule: &Schedule,
        scheduled_for: DateTime<Utc>,
    ) -> Result<DeliveryReceipt> {
        let report = self
            .renderer
            .render(schedule, scheduled_for)
            .await
            .map_err(as_delivery_failure)?;
        self.delivery
            .deliver(schedule, &report)
            .await
            .map_err(as_delivery_failure)
    }

    /// Pause or resume a schedule in this coordinator's store
    pub async fn set_active(&self, id: &str, active: bool, now: DateTime<Utc>) -> Result<Schedule> {
        set_schedule_active(self.store.as_ref(), id, active, now).await
    }

    /// Snapshot of the delivery log, oldest first
    pub async fn delivery_log(&self) -> Vec<DeliveryEntry> {
        self.log.lock().await.entries().to_vec()
    }

    pub async fn delivery_stats(&self) -> DeliveryStats {
        self.log.lock().await.stats()
    }
}

fn as_delivery_failure(error: QsError) -> QsError {
    match error {
        QsError::DeliveryFailure(_) => error,
        other => QsError::DeliveryFailure(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{ScheduleSpec, TimeOfDay};
    use crate::schedule::NewSchedule;

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    fn daily(name: &str, hour: u32, created: &str) -> Schedule {
        Schedule::create(
            NewSchedule {
                report_name: name.to_string(),
                schedule: ScheduleSpec::daily(TimeOfDay::new(hour, 0).unwrap()),
                recipients: vec!["qa@plant.example".to_string()],
                format: ReportFormat::Pdf,
            },
            at(created),
        )
        .unwrap()
    }

    #[test]
    fn test_due_schedules_order_and_filter() {
        let early = daily("early", 6, "2026-03-01T00:00:00Z");
        let late = daily("late", 7, "2026-03-01T00:00:00Z");
        let future = daily("future", 23, "2026-03-01T00:00:00Z");
        let mut paused = daily("paused", 5, "2026-03-01T00:00:00Z");
        paused.pause().unwrap();

        let now = at("2026-03-01T08:00:00Z");
        let due = due_schedules(now, &[late.clone(), future, paused, early.clone()]);
        let names: Vec<&str> = due.iter().map(|s| s.report_name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn test_due_schedules_ties_by_id() {
        let a = daily("a", 6, "2026-03-01T00:00:00Z");
        let b = daily("b", 6, "2026-03-01T00:00:00Z");
        let due = due_schedules(at("2026-03-01T06:00:00Z"), &[a.clone(), b.clone()]);
        let mut ids = vec![a.id, b.id];
        ids.sort();
        assert_eq!(due.iter().map(|s| s.id.clone()).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_wrapped_errors_become_delivery_failures() {
        let err = as_delivery_failure(QsError::StoreError("down".to_string()));
        assert_eq!(err.code(), "DELIVERY");
        let err = as_delivery_failure(QsError::DeliveryFailure("bounced".to_string()));
        assert_eq!(err, QsError::DeliveryFailure("bounced".to_string()));
    }
}
