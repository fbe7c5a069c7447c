use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::{quizzes::player_service, reject};
use crate::extractors::AppJson;
use crate::models::answer::SubmitAnswerRequest;
use crate::services::AppState;

/// POST /api/v1/quizzes/{code}/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Answer for quiz {} question {} from {}",
        code,
        req.question_index,
        req.username
    );

    let result = player_service(&state)
        .submit(&code, req)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(result)))
}
