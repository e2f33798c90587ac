//! Data Model: ParameterSet, GoldenBatch, ProcessRun
use crate::catalog::ParameterKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tolerance applied when a golden batch has no entry for a parameter (percent)
pub const DEFAULT_TOLERANCE_PCT: f64 = 5.0;

/// Parameter values of a golden batch reference or of one process run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<ParameterKey, f64>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<ParameterKey>, value: f64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<ParameterKey>, value: f64) -> Option<f64> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &ParameterKey) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn contains(&self, key: &ParameterKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &ParameterKey) -> Option<f64> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParameterKey> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParameterKey, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<ParameterKey>> FromIterator<(K, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Allowed deviation per parameter, as a percentage of the reference value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToleranceSet(BTreeMap<ParameterKey, f64>);

impl ToleranceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<ParameterKey>, pct: f64) -> Self {
        self.0.insert(key.into(), pct);
        self
    }

    pub fn insert(&mut self, key: impl Into<ParameterKey>, pct: f64) -> Option<f64> {
        self.0.insert(key.into(), pct)
    }

    pub fn get(&self, key: &ParameterKey) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// Tolerance for `key`, or `default` when none is recorded
    pub fn tolerance_for(&self, key: &ParameterKey, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParameterKey> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParameterKey, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<ParameterKey>> FromIterator<(K, f64)> for ToleranceSet {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_pass_yield: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defect_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waste_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoldenBatchStatus {
    Draft,
    Active,
    Retired,
}

/// Approved reference recipe for a product on a line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenBatch {
    pub id: String,
    pub name: String,
    pub product_code: String,
    pub line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Process run the reference was taken from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_process_run_id: Option<String>,
    pub parameters: ParameterSet,
    #[serde(default)]
    pub tolerances: ToleranceSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_metrics: Option<QualityMetrics>,
    pub status: GoldenBatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_date: Option<DateTime<Utc>>,
    pub created_date: DateTime<Utc>,
}

impl GoldenBatch {
    /// New draft batch with a generated id
    pub fn draft(
        name: impl Into<String>,
        product_code: impl Into<String>,
        line: impl Into<String>,
        parameters: ParameterSet,
        created_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            product_code: product_code.into(),
            line: line.into(),
            description: None,
            source_process_run_id: None,
            parameters,
            tolerances: ToleranceSet::new(),
            quality_metrics: None,
            status: GoldenBatchStatus::Draft,
            approved_by: None,
            approved_date: None,
            created_date,
        }
    }

    pub fn with_tolerances(mut self, tolerances: ToleranceSet) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn with_quality_metrics(mut self, metrics: QualityMetrics) -> Self {
        self.quality_metrics = Some(metrics);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == GoldenBatchStatus::Active
    }
}

/// One observed production interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRun {
    pub id: String,
    pub product_code: String,
    pub line: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
    pub parameters: ParameterSet,
    /// Raw sensor samples recorded during the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensor_readings: Vec<ParameterSet>,
    pub created_date: DateTime<Utc>,
}

impl ProcessRun {
    pub fn new(
        product_code: impl Into<String>,
        line: impl Into<String>,
        start_time: DateTime<Utc>,
        parameters: ParameterSet,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            product_code: product_code.into(),
            line: line.into(),
            start_time,
            end_time: None,
            operator: None,
            shift: None,
            parameters,
            sensor_readings: Vec::new(),
            created_date: start_time,
        }
    }

    pub fn with_sensor_readings(mut self, readings: Vec<ParameterSet>) -> Self {
        self.sensor_readings = readings;
        self
    }

    /// Measured value for `key`.
    ///
    /// Uses the directly recorded value when it is finite, otherwise the mean
    /// of the finite sensor readings for that key.
    pub fn value_for(&self, key: &ParameterKey) -> Option<f64> {
        if let Some(value) = self.parameters.get(key).filter(|v| v.is_finite()) {
            return Some(value);
        }

        let readings: Vec<f64> = self
            .sensor_readings
            .iter()
            .filter_map(|r| r.get(key))
            .filter(|v| v.is_finite())
            .collect();

        if readings.is_empty() {
            None
        } else {
            Some(readings.iter().sum::<f64>() / readings.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_parameter_set_json_shape() {
        let set = ParameterSet::new().with("lineSpeed", 45.0).with("dryerTemp", 80.0);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["lineSpeed"], 45.0);
        assert_eq!(json["dryerTemp"], 80.0);

        let back: ParameterSet = serde_json::from_value(json).unwrap();
        assert_eq!(back.get(&ParameterKey::LineSpeed), Some(45.0));
    }

    #[test]
    fn test_tolerance_default() {
        let tol = ToleranceSet::new().with("lineSpeed", 3.0);
        assert_eq!(tol.tolerance_for(&ParameterKey::LineSpeed, DEFAULT_TOLERANCE_PCT), 3.0);
        assert_eq!(tol.tolerance_for(&ParameterKey::Humidity, DEFAULT_TOLERANCE_PCT), 5.0);
    }

    #[test]
    fn test_run_value_prefers_direct_reading() {
        let run = ProcessRun::new(
            "PX-100",
            "Line 1",
            ts("2026-03-02T06:00:00Z"),
            ParameterSet::new().with("lineSpeed", 44.0),
        )
        .with_sensor_readings(vec![ParameterSet::new().with("lineSpeed", 50.0)]);

        assert_eq!(run.value_for(&ParameterKey::LineSpeed), Some(44.0));
    }

    #[test]
    fn test_run_value_falls_back_to_sensor_mean() {
        let run = ProcessRun::new("PX-100", "Line 1", ts("2026-03-02T06:00:00Z"), ParameterSet::new())
            .with_sensor_readings(vec![
                ParameterSet::new().with("nipPressure", 2.0),
                ParameterSet::new().with("nipPressure", 4.0),
                ParameterSet::new().with("nipPressure", f64::NAN),
                ParameterSet::new().with("humidity", 40.0),
            ]);

        assert_eq!(run.value_for(&ParameterKey::NipPressure), Some(3.0));
        assert_eq!(run.value_for(&ParameterKey::LineSpeed), None);
    }

    #[test]
    fn test_golden_batch_camel_case() {
        let batch = GoldenBatch::draft(
            "PX-100 reference",
            "PX-100",
            "Line 1",
            ParameterSet::new().with("lineSpeed", 45.0),
            ts("2026-01-10T08:00:00Z"),
        );
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["productCode"], "PX-100");
        assert_eq!(json["status"], "draft");
        assert!(json.get("approvedBy").is_none());
    }
}
