//! Prometheus metrics for the service
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use qs_conformance::ConformanceReport;
use qs_schedule::PollSummary;

pub struct Metrics {
    registry: Registry,
    conformance_evaluations: IntCounterVec,
    deliveries: IntCounterVec,
    polls: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let conformance_evaluations = IntCounterVec::new(
            Opts::new("qs_conformance_evaluations_total", "Conformance evaluations by verdict"),
            &["verdict"],
        )?;
        let deliveries = IntCounterVec::new(
            Opts::new("qs_report_deliveries_total", "Scheduled report deliveries by outcome"),
            &["outcome"],
        )?;
        let polls = IntCounter::new("qs_schedule_polls_total", "Schedule polls run")?;

        registry.register(Box::new(conformance_evaluations.clone()))?;
        registry.register(Box::new(deliveries.clone()))?;
        registry.register(Box::new(polls.clone()))?;

        Ok(Self {
            registry,
            conformance_evaluations,
            deliveries,
            polls,
        })
    }

    pub fn record_conformance(&self, report: &ConformanceReport) {
        let verdict = if report.is_conforming() {
            "conforming"
        } else {
            "non_conforming"
        };
        self.conformance_evaluations.with_label_values(&[verdict]).inc();
    }

    pub fn record_poll(&self, summary: &PollSummary) {
        self.polls.inc();
        self.deliveries
            .with_label_values(&["delivered"])
            .inc_by(summary.delivered.len() as u64);
        self.deliveries
            .with_label_values(&["failed"])
            .inc_by(summary.failed.len() as u64);
    }

    /// Text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_after_poll() {
        let metrics = Metrics::new().unwrap();
        metrics.record_poll(&PollSummary {
            fired: vec!["a".into(), "b".into()],
            delivered: vec!["a".into()],
            failed: vec!["b".into()],
            skipped: vec![],
        });
        let text = metrics.encode().unwrap();
        assert!(text.contains("qs_report_deliveries_total{outcome=\"delivered\"} 1"));
        assert!(text.contains("qs_schedule_polls_total 1"));
    }
}
