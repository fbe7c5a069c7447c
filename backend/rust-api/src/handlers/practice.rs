use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::reject;
use crate::extractors::AppJson;
use crate::models::practice::{PracticeAnswerRequest, PracticeCompleteRequest, PracticeRegistration};
use crate::models::quiz::QuestionInput;
use crate::services::{practice_service::PracticeService, AppState};

/// PUT /api/v1/practice/{game}/questions
pub async fn publish_questions(
    State(state): State<Arc<AppState>>,
    Path(game): Path<String>,
    AppJson(questions): AppJson<Vec<QuestionInput>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Publishing {} practice questions for {}", questions.len(), game);

    let service = PracticeService::new(state.store.clone());
    let count = service
        .publish_questions(&game, questions)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(json!({ "game": game, "questionCount": count }))))
}

/// GET /api/v1/practice/{game}/questions
pub async fn get_questions(
    State(state): State<Arc<AppState>>,
    Path(game): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Getting practice questions for {}", game);

    let service = PracticeService::new(state.store.clone());
    let questions = service.questions(&game).await.map_err(reject)?;

    Ok((StatusCode::OK, Json(questions)))
}

/// POST /api/v1/practice/{game}/players
pub async fn register_player(
    State(state): State<Arc<AppState>>,
    Path(game): Path<String>,
    AppJson(req): AppJson<PracticeRegistration>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Practice registration for {}", game);

    let service = PracticeService::new(state.store.clone());
    let player = service.register(&game, req).await.map_err(reject)?;

    Ok((StatusCode::CREATED, Json(player)))
}

/// POST /api/v1/practice/{game}/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(game): Path<String>,
    AppJson(req): AppJson<PracticeAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Practice answer for {} question {} from {}",
        game,
        req.question_index,
        req.username
    );

    let service = PracticeService::new(state.store.clone());
    let result = service.submit(&game, req).await.map_err(reject)?;

    Ok((StatusCode::OK, Json(result)))
}

/// POST /api/v1/practice/{game}/complete
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Path(game): Path<String>,
    AppJson(req): AppJson<PracticeCompleteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("{} completed practice game {}", req.username, game);

    let service = PracticeService::new(state.store.clone());
    service.complete(&game, &req.username).await.map_err(reject)?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/practice/leaderboard
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Getting practice leaderboard");

    let service = PracticeService::new(state.store.clone());
    let entries = service.leaderboard().await.map_err(reject)?;

    Ok((StatusCode::OK, Json(entries)))
}
