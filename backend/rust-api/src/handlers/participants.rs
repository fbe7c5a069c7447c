use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::reject;
use crate::extractors::AppJson;
use crate::models::participant::JoinRequest;
use crate::services::{join_service::JoinService, AppState};

/// POST /api/v1/quizzes/{code}/participants
pub async fn join(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    AppJson(req): AppJson<JoinRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Join request for quiz {} as '{}'", code, req.username);

    let service = JoinService::new(state.store.clone(), state.config.reserved_usernames.clone());
    let joined = service.join(&code, req).await.map_err(reject)?;

    Ok((StatusCode::CREATED, Json(joined)))
}

/// GET /api/v1/quizzes/{code}/participants
pub async fn list_participants(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Listing participants of quiz {}", code);

    let service = JoinService::new(state.store.clone(), state.config.reserved_usernames.clone());
    let participants = service.participants(&code).await.map_err(reject)?;

    Ok((StatusCode::OK, Json(participants)))
}
