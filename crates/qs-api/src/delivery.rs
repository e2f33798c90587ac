//! Report rendering and delivery used by the service
//!
//! Mail transport lives outside this service; [`TracingDelivery`] records
//! the hand-off in the log so a collector or sidecar can pick it up.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qs_conformance::ConformanceEngine;
use qs_core::{EntityStore, GoldenBatch, ListOrder, MemoryStore, ProcessRun, Result};
use qs_schedule::{DeliveryReceipt, RenderedReport, ReportDelivery, ReportRenderer, Schedule};
use std::fmt::Write as _;
use std::sync::Arc;

/// Runs considered by one summary
const SUMMARY_RUN_LIMIT: usize = 50;

/// Plain-text quality summary: recent process runs judged against the
/// active golden batch for their product and line
pub struct SummaryRenderer {
    golden_batches: Arc<MemoryStore<GoldenBatch>>,
    process_runs: Arc<MemoryStore<ProcessRun>>,
    engine: Arc<ConformanceEngine>,
}

impl SummaryRenderer {
    pub fn new(
        golden_batches: Arc<MemoryStore<GoldenBatch>>,
        process_runs: Arc<MemoryStore<ProcessRun>>,
        engine: Arc<ConformanceEngine>,
    ) -> Self {
        Self {
            golden_batches,
            process_runs,
            engine,
        }
    }
}

#[async_trait]
impl ReportRenderer for SummaryRenderer {
    async fn render(&self, schedule: &Schedule, scheduled_for: DateTime<Utc>) -> Result<RenderedReport> {
        let batches: Vec<GoldenBatch> = self
            .golden_batches
            .list(ListOrder::NewestFirst, None)
            .await?
            .into_iter()
            .filter(|b| b.is_active())
            .collect();
        let runs: Vec<ProcessRun> = self
            .process_runs
            .list(ListOrder::NewestFirst, None)
            .await?
            .into_iter()
            .filter(|r| r.start_time <= scheduled_for)
            .take(SUMMARY_RUN_LIMIT)
            .collect();

        let (mut conforming, mut non_conforming, mut unmatched) = (0usize, 0usize, 0usize);
        for run in &runs {
            let golden = batches
                .iter()
                .find(|b| b.product_code == run.product_code && b.line == run.line);
            match golden.map(|b| self.engine.evaluate_run(b, run)) {
                Some(Ok(report)) if report.is_conforming() => conforming += 1,
                Some(Ok(_)) => non_conforming += 1,
                Some(Err(e)) => {
                    tracing::debug!(run = %run.id, error = %e, "run skipped in summary");
                    unmatched += 1;
                }
                None => unmatched += 1,
            }
        }

        let mut body = String::new();
        let _ = writeln!(body, "{}", schedule.report_name);
        let _ = writeln!(body, "{} ({})", schedule.describe(), scheduled_for.to_rfc3339());
        let _ = writeln!(body, "Active golden batches: {}", batches.len());
        let _ = writeln!(body, "Process runs reviewed: {}", runs.len());
        let _ = writeln!(body, "  conforming: {}", conforming);
        let _ = writeln!(body, "  non-conforming: {}", non_conforming);
        let _ = writeln!(body, "  without golden batch: {}", unmatched);

        Ok(RenderedReport {
            title: format!("{} - {}", schedule.report_name, scheduled_for.format("%Y-%m-%d")),
            format: schedule.format,
            body,
            scheduled_for,
        })
    }
}

/// Logs each hand-off instead of sending mail
#[derive(Debug, Default)]
pub struct TracingDelivery;

#[async_trait]
impl ReportDelivery for TracingDelivery {
    async fn deliver(&self, schedule: &Schedule, report: &RenderedReport) -> Result<DeliveryReceipt> {
        let message_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            schedule = %schedule.id,
            title = %report.title,
            format = %report.format,
            recipients = ?schedule.recipients,
            message_id = %message_id,
            "report handed off"
        );
        Ok(DeliveryReceipt {
            delivered_to: schedule.recipients.clone(),
            message_id: Some(message_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qs_core::{ParameterSet, ToleranceSet};
    use qs_schedule::{NewSchedule, ReportFormat, ScheduleSpec, TimeOfDay};

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    #[tokio::test]
    async fn test_summary_counts_runs() {
        let golden_batches: Arc<MemoryStore<GoldenBatch>> = Arc::new(MemoryStore::new());
        let process_runs: Arc<MemoryStore<ProcessRun>> = Arc::new(MemoryStore::new());

        let batch = qs_conformance::approve(
            GoldenBatch::draft(
                "PX-100 reference",
                "PX-100",
                "Line 1",
                ParameterSet::new().with("lineSpeed", 45.0),
                at("2026-03-01T00:00:00Z"),
            )
            .with_tolerances(ToleranceSet::new().with("lineSpeed", 5.0)),
            "qa lead",
            at("2026-03-01T00:00:00Z"),
            5.0,
        )
        .unwrap();
        golden_batches.create(batch).await.unwrap();

        for (speed, line) in [(47.0, "Line 1"), (49.0, "Line 1"), (45.0, "Line 9")] {
            process_runs
                .create(ProcessRun::new(
                    "PX-100",
                    line,
                    at("2026-03-02T06:00:00Z"),
                    ParameterSet::new().with("lineSpeed", speed),
                ))
                .await
                .unwrap();
        }

        let renderer = SummaryRenderer::new(
            golden_batches,
            process_runs,
            Arc::new(ConformanceEngine::default()),
        );
        let schedule = Schedule::create(
            NewSchedule {
                report_name: "Daily Quality".to_string(),
                schedule: ScheduleSpec::daily(TimeOfDay::default()),
                recipients: vec!["qa@plant.example".to_string()],
                format: ReportFormat::EmailSummary,
            },
            at("2026-03-02T00:00:00Z"),
        )
        .unwrap();

        let report = renderer.render(&schedule, schedule.next_run).await.unwrap();
        assert_eq!(report.title, "Daily Quality - 2026-03-02");
        assert!(report.body.contains("Process runs reviewed: 3"));
        assert!(report.body.contains("  conforming: 1"));
        assert!(report.body.contains("  non-conforming: 1"));
        assert!(report.body.contains("  without golden batch: 1"));

        let receipt = TracingDelivery.deliver(&schedule, &report).await.unwrap();
        assert_eq!(receipt.delivered_to, schedule.recipients);
    }
}
