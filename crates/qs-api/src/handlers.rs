//! API Handlers
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use qs_conformance::{
    approve, approve_from_run, compatible_runs, find_active_duplicate, retire, ConformanceEngine,
    ConformanceProfile, ConformanceReport,
};
use qs_core::{
    EntityStore, GoldenBatch, ListOrder, ParameterSet, ProcessRun, QsError, QualityMetrics,
    ToleranceSet, QS_VERSION,
};
use qs_roles::{columns_from_records, RoleAssignment, RoleCounts};
use qs_schedule::{NewSchedule, PollSummary, Schedule};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok", "version": QS_VERSION })))
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let text = state
        .metrics
        .encode()
        .map_err(|e| QsError::StoreError(format!("metrics encoding: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub oldest_first: bool,
}

impl ListQuery {
    fn order(&self) -> ListOrder {
        if self.oldest_first {
            ListOrder::OldestFirst
        } else {
            ListOrder::NewestFirst
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub reference: ParameterSet,
    #[serde(default)]
    pub tolerances: ToleranceSet,
    pub sample: ParameterSet,
    /// Profile name ("standard", "audit"); the configured profile otherwise
    pub profile: Option<String>,
}

pub async fn evaluate_conformance(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> ApiResult<Json<ConformanceReport>> {
    let report = match request.profile.as_deref() {
        Some(name) => ConformanceEngine::new(ConformanceProfile::for_name(name)).evaluate(
            &request.reference,
            &request.tolerances,
            &request.sample,
        )?,
        None => state
            .engine
            .evaluate(&request.reference, &request.tolerances, &request.sample)?,
    };
    state.metrics.record_conformance(&report);
    Ok(Json(report))
}

/// Either explicit column names or uploaded records to take them from
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub records: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    pub assignment: RoleAssignment,
    pub counts: RoleCounts,
    pub usable: bool,
}

pub async fn classify_roles(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> ApiResult<Json<ClassifyResponse>> {
    let columns = if request.columns.is_empty() {
        columns_from_records(&request.records)
    } else {
        request.columns
    };
    if columns.is_empty() {
        return Err(ApiError(QsError::InvalidInput(
            "no columns or records to classify".to_string(),
        )));
    }
    let assignment = state.classifier.classify(&columns);
    Ok(Json(ClassifyResponse {
        counts: assignment.counts(),
        usable: assignment.is_confirmed_usable(),
        assignment,
    }))
}

pub async fn list_golden_batches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<GoldenBatch>>> {
    Ok(Json(state.golden_batches.list(query.order(), query.limit).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveGoldenBatchRequest {
    pub name: String,
    pub approved_by: String,
    /// Take product, line and parameters from this run
    pub source_process_run_id: Option<String>,
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default)]
    pub tolerances: ToleranceSet,
    pub description: Option<String>,
    pub quality_metrics: Option<QualityMetrics>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveGoldenBatchResponse {
    pub golden_batch: GoldenBatch,
    /// An already active batch for the same product and line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

pub async fn create_golden_batch(
    State(state): State<AppState>,
    Json(request): Json<ApproveGoldenBatchRequest>,
) -> ApiResult<(StatusCode, Json<ApproveGoldenBatchResponse>)> {
    let now = Utc::now();
    let default_pct = state.engine.profile().default_tolerance_pct;

    let mut batch = match request.source_process_run_id.as_deref() {
        Some(run_id) => {
            let run = state
                .process_runs
                .get(run_id)
                .await?
                .ok_or_else(|| QsError::NotFound(format!("process run {}", run_id)))?;
            approve_from_run(
                &run,
                request.name,
                request.tolerances,
                request.approved_by,
                now,
                default_pct,
            )?
        }
        None => approve(
            GoldenBatch::draft(
                request.name,
                request.product_code,
                request.line,
                request.parameters,
                now,
            )
            .with_tolerances(request.tolerances),
            request.approved_by,
            now,
            default_pct,
        )?,
    };
    batch.description = request.description;
    batch.quality_metrics = request.quality_metrics;

    let existing = state.golden_batches.list(ListOrder::NewestFirst, None).await?;
    let duplicate_of = find_active_duplicate(&existing, &batch.product_code, &batch.line, None)
        .map(|b| b.id.clone());
    if let Some(ref other) = duplicate_of {
        tracing::warn!(
            id = %batch.id,
            duplicate_of = %other,
            product = %batch.product_code,
            line = %batch.line,
            "second active golden batch for product and line"
        );
    }

    let golden_batch = state.golden_batches.create(batch).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApproveGoldenBatchResponse {
            golden_batch,
            duplicate_of,
        }),
    ))
}

pub async fn retire_golden_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<GoldenBatch>> {
    let batch = state
        .golden_batches
        .get(&id)
        .await?
        .ok_or_else(|| QsError::NotFound(format!("golden batch {}", id)))?;
    let retired = state.golden_batches.update(retire(&batch)?).await?;
    tracing::info!(id = %retired.id, "golden batch retired");
    Ok(Json(retired))
}

pub async fn compare_run(
    State(state): State<AppState>,
    Path((id, run_id)): Path<(String, String)>,
) -> ApiResult<Json<ConformanceReport>> {
    let batch = state
        .golden_batches
        .get(&id)
        .await?
        .ok_or_else(|| QsError::NotFound(format!("golden batch {}", id)))?;
    let run = state
        .process_runs
        .get(&run_id)
        .await?
        .ok_or_else(|| QsError::NotFound(format!("process run {}", run_id)))?;

    if compatible_runs(&batch, std::slice::from_ref(&run)).is_empty() {
        return Err(ApiError(QsError::InvalidInput(format!(
            "process run {} shares neither product nor line with golden batch {}",
            run.id, batch.id
        ))));
    }

    let report = state.engine.evaluate_run(&batch, &run)?;
    state.metrics.record_conformance(&report);
    Ok(Json(report))
}

pub async fn list_process_runs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ProcessRun>>> {
    Ok(Json(state.process_runs.list(query.order(), query.limit).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProcessRun {
    pub product_code: String,
    pub line: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub operator: Option<String>,
    pub shift: Option<String>,
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default)]
    pub sensor_readings: Vec<ParameterSet>,
}

pub async fn create_process_run(
    State(state): State<AppState>,
    Json(request): Json<NewProcessRun>,
) -> ApiResult<(StatusCode, Json<ProcessRun>)> {
    if request.product_code.trim().is_empty() || request.line.trim().is_empty() {
        return Err(ApiError(QsError::InvalidInput(
            "process run needs a product code and a line".to_string(),
        )));
    }
    if let Some(end) = request.end_time {
        if end < request.start_time {
            return Err(ApiError(QsError::InvalidInput(
                "process run ends before it starts".to_string(),
            )));
        }
    }

    let mut run = ProcessRun::new(
        request.product_code,
        request.line,
        request.start_time,
        request.parameters,
    )
    .with_sensor_readings(request.sensor_readings);
    run.end_time = request.end_time;
    run.operator = request.operator;
    run.shift = request.shift;
    run.created_date = Utc::now();

    let run = state.process_runs.create(run).await?;
    Ok((StatusCode::CREATED, Json(run)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub description: String,
}

impl From<Schedule> for ScheduleView {
    fn from(schedule: Schedule) -> Self {
        Self {
            description: schedule.describe(),
            schedule,
        }
    }
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ScheduleView>>> {
    let schedules = state.schedules.list(query.order(), query.limit).await?;
    Ok(Json(schedules.into_iter().map(ScheduleView::from).collect()))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(draft): Json<NewSchedule>,
) -> ApiResult<(StatusCode, Json<ScheduleView>)> {
    let schedule = Schedule::create(draft, Utc::now())?;
    let schedule = state.schedules.create(schedule).await?;
    tracing::info!(
        id = %schedule.id,
        report = %schedule.report_name,
        next_run = %schedule.next_run,
        "schedule created"
    );
    Ok((StatusCode::CREATED, Json(schedule.into())))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

pub async fn set_schedule_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<Json<ScheduleView>> {
    let schedule = state
        .coordinator
        .set_active(&id, request.active, Utc::now())
        .await?;
    tracing::info!(id = %schedule.id, active = schedule.active, "schedule toggled");
    Ok(Json(schedule.into()))
}

/// Run one coordinator poll now
pub async fn poll_schedules(State(state): State<AppState>) -> ApiResult<Json<PollSummary>> {
    let summary = crate::poll_once(&state, Utc::now()).await?;
    Ok(Json(summary))
}
