use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::reject;
use crate::services::{leaderboard_service::LeaderboardService, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    /// Only the first `top` entries.
    pub top: Option<usize>,
}

/// GET /api/v1/quizzes/{code}/leaderboard
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Getting leaderboard of quiz {}", code);

    let service = LeaderboardService::new(state.store.clone());
    let mut board = service.snapshot(&code).await.map_err(reject)?;
    if let Some(n) = query.top {
        board.entries.truncate(n);
    }

    Ok((StatusCode::OK, Json(board)))
}

/// GET /api/v1/quizzes/{code}/podium
pub async fn get_podium(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Getting podium of quiz {}", code);

    let service = LeaderboardService::new(state.store.clone());
    let podium = service.top3(&code).await.map_err(reject)?;

    Ok((StatusCode::OK, Json(podium)))
}

/// GET /api/v1/quizzes/{code}/questions/{index}/responses
pub async fn question_responses(
    State(state): State<Arc<AppState>>,
    Path((code, index)): Path<(String, u32)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Getting responses to question {} of quiz {}", index, code);

    let service = LeaderboardService::new(state.store.clone());
    let responses = service
        .question_responses(&code, index)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(responses)))
}
