//! Quality Studio API /v1: REST endpoints over the decision core
pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use config::ServiceConfig;
use delivery::{SummaryRenderer, TracingDelivery};
use metrics::Metrics;
use qs_conformance::ConformanceEngine;
use qs_core::{GoldenBatch, MemoryStore, ProcessRun, QsError, Result};
use qs_roles::RoleClassifier;
use qs_schedule::{DeliveryCoordinator, PollSummary, ReportDelivery, Schedule};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub golden_batches: Arc<MemoryStore<GoldenBatch>>,
    pub process_runs: Arc<MemoryStore<ProcessRun>>,
    pub schedules: Arc<MemoryStore<Schedule>>,
    pub engine: Arc<ConformanceEngine>,
    pub classifier: Arc<RoleClassifier>,
    pub coordinator: Arc<DeliveryCoordinator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Self::with_delivery(config, Arc::new(TracingDelivery))
    }

    /// State with a custom delivery collaborator
    pub fn with_delivery(config: &ServiceConfig, delivery: Arc<dyn ReportDelivery>) -> Result<Self> {
        let golden_batches: Arc<MemoryStore<GoldenBatch>> = Arc::new(MemoryStore::new());
        let process_runs: Arc<MemoryStore<ProcessRun>> = Arc::new(MemoryStore::new());
        let schedules: Arc<MemoryStore<Schedule>> = Arc::new(MemoryStore::new());
        let engine = Arc::new(ConformanceEngine::new(config.conformance.clone()));
        let renderer = Arc::new(SummaryRenderer::new(
            golden_batches.clone(),
            process_runs.clone(),
            engine.clone(),
        ));
        let coordinator = Arc::new(DeliveryCoordinator::with_config(
            schedules.clone(),
            renderer,
            delivery,
            config.coordinator(),
        ));
        let metrics = Metrics::new().map_err(|e| QsError::ConfigError(e.to_string()))?;

        Ok(Self {
            golden_batches,
            process_runs,
            schedules,
            engine,
            classifier: Arc::new(RoleClassifier::new(config.roles.clone())),
            coordinator,
            metrics: Arc::new(metrics),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/v1/conformance/evaluate", post(handlers::evaluate_conformance))
        .route("/v1/roles/classify", post(handlers::classify_roles))
        .route(
            "/v1/golden-batches",
            get(handlers::list_golden_batches).post(handlers::create_golden_batch),
        )
        .route("/v1/golden-batches/{id}/retire", post(handlers::retire_golden_batch))
        .route("/v1/golden-batches/{id}/compare/{run_id}", get(handlers::compare_run))
        .route(
            "/v1/process-runs",
            get(handlers::list_process_runs).post(handlers::create_process_run),
        )
        .route(
            "/v1/schedules",
            get(handlers::list_schedules).post(handlers::create_schedule),
        )
        .route("/v1/schedules/{id}/active", post(handlers::set_schedule_active))
        .route("/v1/schedules/poll", post(handlers::poll_schedules))
        .with_state(state)
        .layer(middleware::trace())
        .layer(middleware::cors())
}

/// One coordinator poll, counted in the metrics
pub async fn poll_once(state: &AppState, now: DateTime<Utc>) -> Result<PollSummary> {
    let summary = state.coordinator.poll(now).await?;
    state.metrics.record_poll(&summary);
    Ok(summary)
}

/// Poll the schedule store every `period` until the task is aborted
pub fn spawn_poll_loop(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = poll_once(&state, Utc::now()).await {
                tracing::warn!(error = %e, "schedule poll failed");
            }
        }
    })
}

pub async fn run(config: ServiceConfig) -> Result<()> {
    let state = AppState::new(&config)?;
    let poller = (config.poll_interval_secs > 0).then(|| {
        spawn_poll_loop(state.clone(), Duration::from_secs(config.poll_interval_secs))
    });

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .map_err(|e| QsError::ConfigError(format!("bind {}: {}", config.addr, e)))?;

    tracing::info!(
        addr = %config.addr,
        poll_interval_secs = config.poll_interval_secs,
        profile = %config.conformance.name,
        "Quality Studio API listening"
    );
    let served = axum::serve(listener, app)
        .await
        .map_err(|e| QsError::StoreError(format!("server: {}", e)));

    if let Some(poller) = poller {
        poller.abort();
    }
    served
}
