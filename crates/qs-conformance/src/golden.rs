//! Golden batch lifecycle rules
//!
//! Validation runs before a batch is persisted; approval, re-approval and
//! retirement enforce the draft → active → retired progression.

use chrono::{DateTime, Utc};
use qs_core::{
    GoldenBatch, GoldenBatchStatus, ParameterSet, ProcessRun, QsError, Result, ToleranceSet,
};

/// Check the structural invariants of a golden batch
pub fn validate_golden_batch(batch: &GoldenBatch) -> Result<()> {
    if batch.name.trim().is_empty() {
        return Err(QsError::InvalidInput("golden batch needs a name".to_string()));
    }
    if batch.product_code.trim().is_empty() || batch.line.trim().is_empty() {
        return Err(QsError::InvalidInput(
            "golden batch needs a product code and a line".to_string(),
        ));
    }
    validate_reference(&batch.parameters, &batch.tolerances)
}

/// Parameters must be non-empty and finite; every tolerance must name a
/// parameter and be a non-negative percent.
pub fn validate_reference(parameters: &ParameterSet, tolerances: &ToleranceSet) -> Result<()> {
    if parameters.is_empty() {
        return Err(QsError::InvalidInput(
            "golden batch needs at least one parameter".to_string(),
        ));
    }
    if let Some((key, _)) = parameters.iter().find(|(_, v)| !v.is_finite()) {
        return Err(QsError::InvalidInput(format!("parameter {} is not a number", key)));
    }
    for (key, pct) in tolerances.iter() {
        if !parameters.contains(key) {
            return Err(QsError::InvalidInput(format!(
                "tolerance for {} has no matching parameter",
                key
            )));
        }
        if !pct.is_finite() || pct < 0.0 {
            return Err(QsError::InvalidInput(format!(
                "tolerance for {} must be a non-negative percent, got {}",
                key, pct
            )));
        }
    }
    Ok(())
}

/// Give every parameter an explicit tolerance, using `default_pct` where
/// none was set.
pub fn finalize_tolerances(batch: &mut GoldenBatch, default_pct: f64) {
    let keys: Vec<_> = batch.parameters.keys().cloned().collect();
    for key in keys {
        if batch.tolerances.get(&key).is_none() {
            batch.tolerances.insert(key, default_pct);
        }
    }
}

/// Approve a draft batch as the active reference
pub fn approve(
    mut batch: GoldenBatch,
    approved_by: impl Into<String>,
    now: DateTime<Utc>,
    default_pct: f64,
) -> Result<GoldenBatch> {
    if batch.status == GoldenBatchStatus::Retired {
        return Err(QsError::InvalidState(format!(
            "golden batch {} is retired",
            batch.id
        )));
    }
    validate_golden_batch(&batch)?;
    finalize_tolerances(&mut batch, default_pct);

    batch.status = GoldenBatchStatus::Active;
    batch.approved_by = Some(approved_by.into());
    batch.approved_date = Some(now);
    tracing::info!(id = %batch.id, product = %batch.product_code, line = %batch.line, "golden batch approved");
    Ok(batch)
}

/// Create and approve a golden batch from a recorded process run.
///
/// Only finite run values become reference parameters.
pub fn approve_from_run(
    run: &ProcessRun,
    name: impl Into<String>,
    tolerances: ToleranceSet,
    approved_by: impl Into<String>,
    now: DateTime<Utc>,
    default_pct: f64,
) -> Result<GoldenBatch> {
    let parameters: ParameterSet = run
        .parameters
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(k, v)| (k.clone(), v))
        .collect();

    let mut batch = GoldenBatch::draft(name, &run.product_code, &run.line, parameters, now)
        .with_tolerances(tolerances);
    batch.source_process_run_id = Some(run.id.clone());
    approve(batch, approved_by, now, default_pct)
}

/// Replace the reference values of an existing batch
pub fn reapprove(
    batch: &GoldenBatch,
    parameters: ParameterSet,
    tolerances: ToleranceSet,
    approved_by: impl Into<String>,
    now: DateTime<Utc>,
    default_pct: f64,
) -> Result<GoldenBatch> {
    let mut updated = batch.clone();
    updated.parameters = parameters;
    updated.tolerances = tolerances;
    approve(updated, approved_by, now, default_pct)
}

/// Retire a batch; it stays stored for audit history
pub fn retire(batch: &GoldenBatch) -> Result<GoldenBatch> {
    if batch.status == GoldenBatchStatus::Retired {
        return Err(QsError::InvalidState(format!(
            "golden batch {} is already retired",
            batch.id
        )));
    }
    let mut retired = batch.clone();
    retired.status = GoldenBatchStatus::Retired;
    Ok(retired)
}

/// An active batch already covering the same product and line
pub fn find_active_duplicate<'a>(
    batches: &'a [GoldenBatch],
    product_code: &str,
    line: &str,
    exclude_id: Option<&str>,
) -> Option<&'a GoldenBatch> {
    batches.iter().find(|b| {
        b.is_active()
            && b.product_code == product_code
            && b.line == line
            && Some(b.id.as_str()) != exclude_id
    })
}

/// Runs worth comparing against `batch`: same product code or same line
pub fn compatible_runs<'a>(batch: &GoldenBatch, runs: &'a [ProcessRun]) -> Vec<&'a ProcessRun> {
    runs.iter()
        .filter(|r| r.product_code == batch.product_code || r.line == batch.line)
        .collect()
}
