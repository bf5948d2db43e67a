//! HTTP gateway for pickroute.
//!
//! Exposes health, the venue overview, manual reprocessing and schedule
//! reload. There is no authentication layer; bind to localhost unless a
//! proxy in front of it handles that.
//!
//! Built on Axum.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use pickroute_core::Error;
use pickroute_engine::{AssignmentPipeline, SyncCounts, VenueOverview};
use pickroute_scheduler::{ScheduledJob, Scheduler};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: Arc<AssignmentPipeline>,
    pub scheduler: Arc<Scheduler>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/venues/{id}/overview", get(overview_handler))
        .route("/v1/venues/{id}/reprocess", post(reprocess_handler))
        .route("/v1/schedules", get(schedules_handler))
        .route("/v1/schedules/reload", post(reload_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(
    config: &pickroute_config::GatewayConfig,
    state: SharedState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Errors ---

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps domain errors onto HTTP: missing venue or snapshot is 404,
/// everything else 500.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            error!(error = %self.0, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn overview_handler(
    State(state): State<SharedState>,
    Path(venue_id): Path<String>,
) -> Result<Json<VenueOverview>, ApiError> {
    Ok(Json(state.pipeline.overview(&venue_id).await?))
}

#[derive(Serialize)]
struct ReprocessResponse {
    venue: String,
    message: &'static str,
    dry_run: bool,
    counts: SyncCounts,
}

async fn reprocess_handler(
    State(state): State<SharedState>,
    Path(venue_id): Path<String>,
) -> Result<Json<ReprocessResponse>, ApiError> {
    info!(venue_id = %venue_id, "Manual reprocess requested");
    let report = state.pipeline.sync(&venue_id).await?;
    Ok(Json(ReprocessResponse {
        venue: report.venue_id.clone(),
        message: "Items reprocessed successfully",
        dry_run: report.dry_run,
        counts: report.counts(),
    }))
}

#[derive(Serialize)]
struct SchedulesResponse {
    jobs: Vec<ScheduledJob>,
}

async fn schedules_handler(State(state): State<SharedState>) -> Json<SchedulesResponse> {
    Json(SchedulesResponse {
        jobs: state.scheduler.jobs().await,
    })
}

#[derive(Serialize)]
struct ReloadResponse {
    active_jobs: usize,
}

async fn reload_handler(
    State(state): State<SharedState>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let active_jobs = state
        .scheduler
        .reload(state.pipeline.store().as_ref())
        .await
        .map_err(Error::from)?;
    info!(active_jobs, "Schedules reloaded");
    Ok(Json(ReloadResponse { active_jobs }))
}
