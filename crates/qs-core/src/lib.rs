//! Quality Studio Core: data model, error model and entity store interface
//!
//! Shared types for the conformance, role and schedule engines.

pub mod catalog;
pub mod data_model;
pub mod error;
pub mod store;

pub use catalog::{ParameterInfo, ParameterKey, CATALOG};
pub use data_model::{
    GoldenBatch, GoldenBatchStatus, ParameterSet, ProcessRun, QualityMetrics, ToleranceSet,
    DEFAULT_TOLERANCE_PCT,
};
pub use error::{QsError, Result};
pub use store::{EntityStore, ListOrder, MemoryStore, Record};

/// Version of the decision core
pub const QS_VERSION: &str = "1.0.0";
