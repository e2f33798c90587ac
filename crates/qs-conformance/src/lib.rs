//! Quality Studio Conformance: golden batch tolerance checks
//!
//! Judges whether a process run stays within the percentage tolerances of
//! a golden batch reference, parameter by parameter and for the batch.
//!
//! # Example
//!
//! ```
//! use qs_conformance::{ConformanceEngine, ParameterStatus};
//! use qs_core::{ParameterKey, ParameterSet, ToleranceSet};
//!
//! let engine = ConformanceEngine::for_profile("standard");
//!
//! let reference = ParameterSet::new().with("lineSpeed", 45.0);
//! let tolerances = ToleranceSet::new().with("lineSpeed", 5.0);
//! let sample = ParameterSet::new().with("lineSpeed", 47.0);
//!
//! let report = engine.evaluate(&reference, &tolerances, &sample).unwrap();
//! assert!(report.is_conforming());
//! assert_eq!(
//!     report.check(&ParameterKey::LineSpeed).unwrap().status,
//!     ParameterStatus::InTolerance
//! );
//! ```

pub mod engine;
pub mod golden;
pub mod profile;

pub use engine::{
    BatchVerdict, ConformanceEngine, ConformanceReport, ParameterCheck, ParameterStatus, EPSILON,
};
pub use golden::{
    approve, approve_from_run, compatible_runs, finalize_tolerances, find_active_duplicate,
    reapprove, retire, validate_golden_batch, validate_reference,
};
pub use profile::{ConformanceProfile, MissingPolicy};

use qs_core::{ParameterSet, Result, ToleranceSet};

/// Quick evaluation with the standard profile
pub fn evaluate(
    reference: &ParameterSet,
    tolerances: &ToleranceSet,
    sample: &ParameterSet,
) -> Result<ConformanceReport> {
    ConformanceEngine::default().evaluate(reference, tolerances, sample)
}

/// Check if a sample would conform to the reference
pub fn would_conform(reference: &ParameterSet, tolerances: &ToleranceSet, sample: &ParameterSet) -> bool {
    evaluate(reference, tolerances, sample)
        .map(|report| report.is_conforming())
        .unwrap_or(false)
}
