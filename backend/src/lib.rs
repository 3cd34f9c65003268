pub mod config;
pub mod cost;
pub mod dem;
pub mod elevation;
pub mod error;
pub mod gpx_io;
pub mod graph;
pub mod metrics;
pub mod models;
pub mod projection;
pub mod resample;
pub mod scoring;
pub mod search;
pub mod selection;

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::config::ScoringConfig;
use crate::elevation::ElevationSource;
use crate::error::RouteError;
use crate::models::{ApiError, ScoreReport, ScoreRequest};
use crate::resample::MIN_STEP_M;
use crate::scoring::RouteScorer;

#[derive(Clone)]
pub struct AppState {
    pub elevation: Arc<dyn ElevationSource>,
    pub config: Arc<ScoringConfig>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/score", post(score_handler))
        .with_state(state)
}

async fn score_handler(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreReport>, (StatusCode, Json<ApiError>)> {
    let scorer = RouteScorer::new(
        req.step_m.unwrap_or(state.config.resample_step_m),
        req.params.unwrap_or(state.config.selection),
    );
    if !scorer.step_m.is_finite() || scorer.step_m < MIN_STEP_M {
        return Err(error_response(RouteError::InvalidInput(format!(
            "step_m must be at least {MIN_STEP_M} m, got {}",
            scorer.step_m
        ))));
    }
    tracing::info!(
        "scoring {} candidates at {} m",
        req.candidates.len(),
        scorer.step_m
    );

    let elevation = Arc::clone(&state.elevation);
    let report = tokio::task::spawn_blocking(move || {
        scorer.evaluate(&req.candidates, elevation.as_ref())
    })
    .await
    .map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                message: format!("scoring task failed: {err}"),
            }),
        )
    })?
    .map_err(error_response)?;

    Ok(Json(report))
}

fn error_response(err: RouteError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        RouteError::InvalidInput(_) | RouteError::UnknownNode(_) => StatusCode::BAD_REQUEST,
        RouteError::EmptyCandidateSet => StatusCode::UNPROCESSABLE_ENTITY,
        RouteError::Unreachable { .. } => StatusCode::NOT_FOUND,
        RouteError::NoData(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("score request failed: {err}");
    } else {
        tracing::warn!("score request rejected: {err}");
    }
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
