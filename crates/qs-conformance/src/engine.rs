//! Tolerance conformance evaluation
//!
//! Compares measured process values against a golden batch reference and
//! produces a per-parameter and batch-level verdict.

use crate::profile::{ConformanceProfile, MissingPolicy};
use qs_core::{GoldenBatch, ParameterKey, ParameterSet, ProcessRun, QsError, Result, ToleranceSet};
use serde::{Deserialize, Serialize};

/// Floor for the reference magnitude when computing a percentage deviation
pub const EPSILON: f64 = 1e-9;

/// Relative slack on the tolerance so rounding in the percentage never
/// moves a value sitting on an acceptance bound out of tolerance
const BOUNDARY_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStatus {
    InTolerance,
    OutOfTolerance,
    /// No usable measurement; reported, never blocking on its own
    Missing,
}

/// Result for a single reference parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCheck {
    pub key: ParameterKey,
    pub label: String,
    pub unit: String,
    pub reference: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured: Option<f64>,
    pub tolerance_pct: f64,
    /// measured - reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
    /// Signed deviation as a percent of the reference. `None` when missing or
    /// when the reference is zero and the measurement is not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation_pct: Option<f64>,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub status: ParameterStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchVerdict {
    Conforming,
    NonConforming,
}

/// Overall conformance report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceReport {
    /// Conforming iff no parameter is out of tolerance
    pub verdict: BatchVerdict,

    /// Verdict after applying the profile's missing-parameter policy
    pub strict_verdict: BatchVerdict,

    /// Per-parameter results, ordered by key
    pub checks: Vec<ParameterCheck>,

    pub in_tolerance: usize,
    pub out_of_tolerance: usize,

    /// Reference parameters with no measurement
    pub missing: Vec<ParameterKey>,

    /// Share of measured parameters within tolerance (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conformance_rate: Option<f64>,

    /// Profile used for evaluation
    pub profile: String,

    pub summary: String,
}

impl ConformanceReport {
    pub fn is_conforming(&self) -> bool {
        self.verdict == BatchVerdict::Conforming
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn check(&self, key: &ParameterKey) -> Option<&ParameterCheck> {
        self.checks.iter().find(|c| &c.key == key)
    }

    pub fn out_of_tolerance_keys(&self) -> Vec<&ParameterKey> {
        self.checks
            .iter()
            .filter(|c| c.status == ParameterStatus::OutOfTolerance)
            .map(|c| &c.key)
            .collect()
    }

    /// Missing parameters as informational errors
    pub fn missing_errors(&self) -> Vec<QsError> {
        self.missing
            .iter()
            .map(|k| QsError::MissingParameter(k.to_string()))
            .collect()
    }
}

/// Engine that evaluates samples against a reference
#[derive(Debug, Clone, Default)]
pub struct ConformanceEngine {
    profile: ConformanceProfile,
}

impl ConformanceEngine {
    pub fn new(profile: ConformanceProfile) -> Self {
        Self { profile }
    }

    pub fn for_profile(name: &str) -> Self {
        Self::new(ConformanceProfile::for_name(name))
    }

    pub fn profile(&self) -> &ConformanceProfile {
        &self.profile
    }

    /// Evaluate `sample` against `reference`.
    ///
    /// Keys in `sample` that the reference does not name are ignored.
    pub fn evaluate(
        &self,
        reference: &ParameterSet,
        tolerances: &ToleranceSet,
        sample: &ParameterSet,
    ) -> Result<ConformanceReport> {
        validate_inputs(reference, tolerances)?;

        let checks: Vec<ParameterCheck> = reference
            .iter()
            .map(|(key, reference_value)| {
                let tolerance = tolerances.tolerance_for(key, self.profile.default_tolerance_pct);
                let measured = sample.get(key).filter(|v| v.is_finite());
                check_parameter(key, reference_value, tolerance, measured)
            })
            .collect();

        let report = self.build_report(checks);
        tracing::debug!(
            profile = %report.profile,
            verdict = ?report.verdict,
            out = report.out_of_tolerance,
            missing = report.missing.len(),
            "conformance evaluated"
        );
        Ok(report)
    }

    /// Evaluate a recorded process run against a golden batch.
    ///
    /// Run values come from the direct reading when present, else from the
    /// mean of the run's sensor readings.
    pub fn evaluate_run(&self, golden: &GoldenBatch, run: &ProcessRun) -> Result<ConformanceReport> {
        let sample: ParameterSet = golden
            .parameters
            .keys()
            .filter_map(|key| run.value_for(key).map(|v| (key.clone(), v)))
            .collect();
        self.evaluate(&golden.parameters, &golden.tolerances, &sample)
    }

    fn build_report(&self, checks: Vec<ParameterCheck>) -> ConformanceReport {
        let in_tolerance = checks
            .iter()
            .filter(|c| c.status == ParameterStatus::InTolerance)
            .count();
        let out: Vec<&str> = checks
            .iter()
            .filter(|c| c.status == ParameterStatus::OutOfTolerance)
            .map(|c| c.key.as_str())
            .collect();
        let missing: Vec<ParameterKey> = checks
            .iter()
            .filter(|c| c.status == ParameterStatus::Missing)
            .map(|c| c.key.clone())
            .collect();

        let verdict = if out.is_empty() {
            BatchVerdict::Conforming
        } else {
            BatchVerdict::NonConforming
        };

        let strict_verdict = match (verdict, self.profile.missing) {
            (BatchVerdict::Conforming, MissingPolicy::Fail) if !missing.is_empty() => {
                BatchVerdict::NonConforming
            }
            _ => verdict,
        };

        let measured = in_tolerance + out.len();
        let conformance_rate = if measured > 0 {
            Some(in_tolerance as f64 / measured as f64)
        } else {
            None
        };

        let mut summary = if out.is_empty() {
            "All measured parameters within tolerance".to_string()
        } else {
            format!("Out of tolerance: {}", out.join(", "))
        };
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
            summary.push_str(&format!("; missing: {}", names.join(", ")));
        }

        ConformanceReport {
            verdict,
            strict_verdict,
            in_tolerance,
            out_of_tolerance: out.len(),
            missing,
            conformance_rate,
            profile: self.profile.name.clone(),
            summary,
            checks,
        }
    }
}

fn validate_inputs(reference: &ParameterSet, tolerances: &ToleranceSet) -> Result<()> {
    if reference.is_empty() {
        return Err(QsError::InvalidInput("reference has no parameters".to_string()));
    }
    if let Some((key, value)) = reference.iter().find(|(_, v)| !v.is_finite()) {
        return Err(QsError::InvalidInput(format!(
            "reference value for {} is not a number: {}",
            key, value
        )));
    }
    if let Some((key, pct)) = tolerances.iter().find(|(_, t)| !t.is_finite() || *t < 0.0) {
        return Err(QsError::InvalidInput(format!(
            "tolerance for {} must be a non-negative percent, got {}",
            key, pct
        )));
    }
    Ok(())
}

fn check_parameter(
    key: &ParameterKey,
    reference: f64,
    tolerance_pct: f64,
    measured: Option<f64>,
) -> ParameterCheck {
    let band = reference.abs() * tolerance_pct / 100.0;
    let mut check = ParameterCheck {
        key: key.clone(),
        label: key.label().to_string(),
        unit: key.unit().to_string(),
        reference,
        measured,
        tolerance_pct,
        deviation: None,
        deviation_pct: None,
        lower_bound: reference - band,
        upper_bound: reference + band,
        status: ParameterStatus::Missing,
    };

    let Some(value) = measured else {
        return check;
    };

    let deviation = value - reference;
    check.deviation = Some(deviation);

    // Percentage is undefined at a zero reference: only an exact match passes.
    if reference == 0.0 {
        if value == 0.0 {
            check.deviation_pct = Some(0.0);
            check.status = ParameterStatus::InTolerance;
        } else {
            check.status = ParameterStatus::OutOfTolerance;
        }
        return check;
    }

    let deviation_pct = deviation * 100.0 / reference.abs().max(EPSILON);
    check.deviation_pct = Some(deviation_pct);
    let within_bounds = (check.lower_bound..=check.upper_bound).contains(&value);
    let within_pct = deviation_pct.abs() <= tolerance_pct * (1.0 + BOUNDARY_SLACK);
    check.status = if within_bounds || within_pct {
        ParameterStatus::InTolerance
    } else {
        ParameterStatus::OutOfTolerance
    };
    check
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ConformanceEngine {
        ConformanceEngine::default()
    }

    #[test]
    fn test_line_speed_within_tolerance() {
        let reference = ParameterSet::new().with("lineSpeed", 45.0);
        let tolerances = ToleranceSet::new().with("lineSpeed", 5.0);
        let sample = ParameterSet::new().with("lineSpeed", 47.0);

        let report = engine().evaluate(&reference, &tolerances, &sample).unwrap();
        let check = report.check(&ParameterKey::LineSpeed).unwrap();

        assert_eq!(check.status, ParameterStatus::InTolerance);
        assert!((check.deviation_pct.unwrap() - 4.444).abs() < 0.001);
        assert!(report.is_conforming());
    }

    #[test]
    fn test_line_speed_out_of_tolerance() {
        let reference = ParameterSet::new().with("lineSpeed", 45.0);
        let tolerances = ToleranceSet::new().with("lineSpeed", 5.0);
        let sample = ParameterSet::new().with("lineSpeed", 49.0);

        let report = engine().evaluate(&reference, &tolerances, &sample).unwrap();
        let check = report.check(&ParameterKey::LineSpeed).unwrap();

        assert_eq!(check.status, ParameterStatus::OutOfTolerance);
        assert!((check.deviation_pct.unwrap() - 8.889).abs() < 0.001);
        assert_eq!(report.verdict, BatchVerdict::NonConforming);
        assert_eq!(report.summary, "Out of tolerance: lineSpeed");
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let reference = ParameterSet::new().with("nipPressure", 100.0);
        let tolerances = ToleranceSet::new().with("nipPressure", 5.0);

        let at_edge = ParameterSet::new().with("nipPressure", 105.0);
        let report = engine().evaluate(&reference, &tolerances, &at_edge).unwrap();
        assert_eq!(report.checks[0].status, ParameterStatus::InTolerance);

        let below_edge = ParameterSet::new().with("nipPressure", 95.0);
        let report = engine().evaluate(&reference, &tolerances, &below_edge).unwrap();
        assert_eq!(report.checks[0].status, ParameterStatus::InTolerance);

        let past_edge = ParameterSet::new().with("nipPressure", 105.001);
        let report = engine().evaluate(&reference, &tolerances, &past_edge).unwrap();
        assert_eq!(report.checks[0].status, ParameterStatus::OutOfTolerance);
    }

    #[test]
    fn test_boundary_is_inclusive_for_inexact_references() {
        for (r, t, edges) in [
            (3.2, 5.0, [3.36, 3.04]),
            (0.7, 3.0, [0.721, 0.679]),
            (1.1, 10.0, [1.21, 0.99]),
        ] {
            let reference = ParameterSet::new().with("nipPressure", r);
            let tolerances = ToleranceSet::new().with("nipPressure", t);
            let computed = [r + r * t / 100.0, r - r * t / 100.0];

            for value in edges.into_iter().chain(computed) {
                let sample = ParameterSet::new().with("nipPressure", value);
                let report = engine().evaluate(&reference, &tolerances, &sample).unwrap();
                let check = &report.checks[0];
                assert_eq!(
                    check.status,
                    ParameterStatus::InTolerance,
                    "r={} t={} s={:?} pct={:?}",
                    r,
                    t,
                    value,
                    check.deviation_pct
                );
            }

            let past = ParameterSet::new().with("nipPressure", r * (1.0 + t / 100.0) + r * 1e-4);
            let report = engine().evaluate(&reference, &tolerances, &past).unwrap();
            assert_eq!(report.checks[0].status, ParameterStatus::OutOfTolerance);
        }
    }

    #[test]
    fn test_value_on_reported_bound_is_in_tolerance() {
        let reference = ParameterSet::new().with("nipPressure", 3.2);
        let tolerances = ToleranceSet::new().with("nipPressure", 5.0);
        let at_reference = engine()
            .evaluate(&reference, &tolerances, &ParameterSet::new().with("nipPressure", 3.2))
            .unwrap();
        let upper = at_reference.checks[0].upper_bound;

        let report = engine()
            .evaluate(&reference, &tolerances, &ParameterSet::new().with("nipPressure", upper))
            .unwrap();
        assert_eq!(report.checks[0].status, ParameterStatus::InTolerance);
    }

    #[test]
    fn test_default_tolerance_applies() {
        let reference = ParameterSet::new().with("humidity", 40.0);
        let sample = ParameterSet::new().with("humidity", 42.0);

        let report = engine().evaluate(&reference, &ToleranceSet::new(), &sample).unwrap();
        assert_eq!(report.checks[0].tolerance_pct, 5.0);
        assert_eq!(report.checks[0].status, ParameterStatus::InTolerance);
    }

    #[test]
    fn test_missing_does_not_block() {
        let reference = ParameterSet::new().with("lineSpeed", 45.0).with("humidity", 40.0);
        let sample = ParameterSet::new().with("lineSpeed", 45.0);

        let report = engine().evaluate(&reference, &ToleranceSet::new(), &sample).unwrap();
        assert!(report.is_conforming());
        assert!(!report.is_complete());
        assert_eq!(report.missing, vec![ParameterKey::Humidity]);
        assert_eq!(report.strict_verdict, BatchVerdict::Conforming);
        assert_eq!(report.missing_errors()[0], QsError::MissingParameter("humidity".to_string()));
    }

    #[test]
    fn test_audit_profile_blocks_missing_in_strict_verdict() {
        let reference = ParameterSet::new().with("lineSpeed", 45.0).with("humidity", 40.0);
        let sample = ParameterSet::new().with("lineSpeed", 45.0);

        let report = ConformanceEngine::new(ConformanceProfile::audit())
            .evaluate(&reference, &ToleranceSet::new(), &sample)
            .unwrap();
        assert_eq!(report.verdict, BatchVerdict::Conforming);
        assert_eq!(report.strict_verdict, BatchVerdict::NonConforming);
    }

    #[test]
    fn test_zero_reference() {
        let reference = ParameterSet::new().with("coronaDyne", 0.0);

        let exact = ParameterSet::new().with("coronaDyne", 0.0);
        let report = engine().evaluate(&reference, &ToleranceSet::new(), &exact).unwrap();
        assert_eq!(report.checks[0].status, ParameterStatus::InTolerance);

        let tiny = ParameterSet::new().with("coronaDyne", 0.0001);
        let report = engine()
            .evaluate(&reference, &ToleranceSet::new().with("coronaDyne", 1000.0), &tiny)
            .unwrap();
        assert_eq!(report.checks[0].status, ParameterStatus::OutOfTolerance);
        assert_eq!(report.checks[0].deviation_pct, None);
    }

    #[test]
    fn test_nan_sample_counts_as_missing() {
        let reference = ParameterSet::new().with("lineSpeed", 45.0);
        let sample = ParameterSet::new().with("lineSpeed", f64::NAN);

        let report = engine().evaluate(&reference, &ToleranceSet::new(), &sample).unwrap();
        assert_eq!(report.checks[0].status, ParameterStatus::Missing);
    }

    #[test]
    fn test_extra_sample_keys_ignored() {
        let reference = ParameterSet::new().with("lineSpeed", 45.0);
        let sample = ParameterSet::new().with("lineSpeed", 45.0).with("uvDose", 999.0);

        let report = engine().evaluate(&reference, &ToleranceSet::new(), &sample).unwrap();
        assert_eq!(report.checks.len(), 1);
    }

    #[test]
    fn test_invalid_inputs() {
        let err = engine()
            .evaluate(&ParameterSet::new(), &ToleranceSet::new(), &ParameterSet::new())
            .unwrap_err();
        assert!(matches!(err, QsError::InvalidInput(_)));

        let reference = ParameterSet::new().with("lineSpeed", 45.0);
        let err = engine()
            .evaluate(&reference, &ToleranceSet::new().with("lineSpeed", -1.0), &reference)
            .unwrap_err();
        assert!(matches!(err, QsError::InvalidInput(_)));
    }

    #[test]
    fn test_bounds_use_reference_magnitude() {
        let reference = ParameterSet::new().with("rollTempChill", -20.0);
        let tolerances = ToleranceSet::new().with("rollTempChill", 10.0);
        let sample = ParameterSet::new().with("rollTempChill", -21.0);

        let report = engine().evaluate(&reference, &tolerances, &sample).unwrap();
        let check = &report.checks[0];
        assert_eq!(check.lower_bound, -22.0);
        assert_eq!(check.upper_bound, -18.0);
        assert_eq!(check.status, ParameterStatus::InTolerance);
    }
}
