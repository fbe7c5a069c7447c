use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::reject;
use crate::extractors::AppJson;
use crate::models::payout::{PayoutRequest, StakeRequest};
use crate::services::{payout_service::PayoutService, AppState};

fn payout_service(state: &AppState) -> PayoutService {
    PayoutService::new(
        state.store.clone(),
        state.payout_gateway.clone(),
        state.config.explorer_tx_base_url.clone(),
    )
}

/// PUT /api/v1/quizzes/{code}/stake
pub async fn record_stake(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    AppJson(req): AppJson<StakeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Recording stake of {} {} for quiz {}", req.amount, req.token, code);

    let record = payout_service(&state)
        .record_stake(&code, req)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(record)))
}

/// POST /api/v1/quizzes/{code}/payout
pub async fn trigger_payout(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    AppJson(req): AppJson<PayoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Payout requested for quiz {}", code);

    let receipt = payout_service(&state)
        .trigger(&code, &req.host_id)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(receipt)))
}
