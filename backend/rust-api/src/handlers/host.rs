use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::reject;
use crate::extractors::AppJson;
use crate::models::session::HostActionRequest;
use crate::services::{host_service::HostService, payout_service::PayoutService, AppState};

pub(crate) fn host_service(state: &AppState) -> HostService {
    HostService::new(state.store.clone()).with_payout(PayoutService::new(
        state.store.clone(),
        state.payout_gateway.clone(),
        state.config.explorer_tx_base_url.clone(),
    ))
}

/// POST /api/v1/quizzes/{code}/start
pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    AppJson(req): AppJson<HostActionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Host starting quiz {}", code);

    let response = host_service(&state)
        .start(&code, &req.host_id)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(response)))
}

/// POST /api/v1/quizzes/{code}/close
pub async fn close_question(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    AppJson(req): AppJson<HostActionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Host closing current question of quiz {}", code);

    let response = host_service(&state)
        .close_question(&code, &req.host_id)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(response)))
}

/// POST /api/v1/quizzes/{code}/next
pub async fn next_question(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    AppJson(req): AppJson<HostActionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Host advancing quiz {}", code);

    let response = host_service(&state)
        .next_question(&code, &req.host_id)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(response)))
}

/// POST /api/v1/quizzes/{code}/finish
pub async fn finish_quiz(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    AppJson(req): AppJson<HostActionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Host finishing quiz {}", code);

    let response = host_service(&state)
        .finish(&code, &req.host_id)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(response)))
}
