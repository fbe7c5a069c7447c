use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::reject;
use crate::extractors::AppJson;
use crate::models::quiz::{CreateFromTemplateRequest, CreateQuizRequest, SaveTemplateRequest};
use crate::services::{
    authoring_service::AuthoringService,
    player_service::{Countdowns, PlayerService},
    AppState,
};

/// POST /api/v1/quizzes
pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Creating {} quiz '{}' with {} questions",
        req.mode.as_str(),
        req.title,
        req.questions.len()
    );

    let service = AuthoringService::new(state.store.clone());
    let created = service.create_quiz(req).await.map_err(reject)?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/quizzes/{code}
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Getting session snapshot: {}", code);

    let service = player_service(&state);
    let snapshot = service.snapshot(&code).await.map_err(reject)?;

    Ok((StatusCode::OK, Json(snapshot)))
}

/// GET /api/v1/hosts/{creator}/quiz
pub async fn creator_quiz(
    State(state): State<Arc<AppState>>,
    Path(creator): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Looking up quiz of creator {}", creator);

    let service = AuthoringService::new(state.store.clone());
    let quiz = service.creator_quiz(&creator).await.map_err(reject)?;

    Ok((StatusCode::OK, Json(quiz)))
}

/// GET /api/v1/templates/{template}
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(template): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let service = AuthoringService::new(state.store.clone());
    let template = service.template(&template).await.map_err(reject)?;

    Ok((StatusCode::OK, Json(template)))
}

/// PUT /api/v1/templates/{template}
pub async fn save_template(
    State(state): State<Arc<AppState>>,
    Path(template): Path<String>,
    AppJson(req): AppJson<SaveTemplateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Saving template {} with {} questions", template, req.questions.len());

    let service = AuthoringService::new(state.store.clone());
    let saved = service.save_template(&template, req).await.map_err(reject)?;

    Ok((StatusCode::OK, Json(saved)))
}

/// POST /api/v1/templates/{template}/quizzes
pub async fn create_from_template(
    State(state): State<Arc<AppState>>,
    Path(template): Path<String>,
    AppJson(req): AppJson<CreateFromTemplateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Creating quiz from template {}", template);

    let service = AuthoringService::new(state.store.clone());
    let created = service
        .create_from_template(&template, req)
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) fn player_service(state: &AppState) -> PlayerService {
    PlayerService::new(state.store.clone(), Countdowns::from(&state.config))
}
