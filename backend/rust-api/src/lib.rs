use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod client;
pub mod config;
pub mod errors;
pub mod extractors;
pub mod game;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Browser clients are served from other origins.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1", api_routes().layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(quiz_routes())
        .route("/hosts/{creator}/quiz", get(handlers::quizzes::creator_quiz))
        .route(
            "/templates/{template}",
            get(handlers::quizzes::get_template).put(handlers::quizzes::save_template),
        )
        .route(
            "/templates/{template}/quizzes",
            post(handlers::quizzes::create_from_template),
        )
        .merge(practice_routes())
}

fn quiz_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quizzes", post(handlers::quizzes::create_quiz))
        .route("/quizzes/{code}", get(handlers::quizzes::get_quiz))
        .route(
            "/quizzes/{code}/participants",
            get(handlers::participants::list_participants).post(handlers::participants::join),
        )
        // Host transitions
        .route("/quizzes/{code}/start", post(handlers::host::start_quiz))
        .route("/quizzes/{code}/close", post(handlers::host::close_question))
        .route("/quizzes/{code}/next", post(handlers::host::next_question))
        .route("/quizzes/{code}/finish", post(handlers::host::finish_quiz))
        // Players
        .route("/quizzes/{code}/answers", post(handlers::answers::submit_answer))
        .route("/quizzes/{code}/stream", get(handlers::sse::session_stream))
        // Leaderboard
        .route("/quizzes/{code}/leaderboard", get(handlers::leaderboard::get_leaderboard))
        .route("/quizzes/{code}/podium", get(handlers::leaderboard::get_podium))
        .route(
            "/quizzes/{code}/questions/{index}/responses",
            get(handlers::leaderboard::question_responses),
        )
        // Rewards
        .route("/quizzes/{code}/stake", put(handlers::payout::record_stake))
        .route("/quizzes/{code}/payout", post(handlers::payout::trigger_payout))
}

fn practice_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/practice/leaderboard", get(handlers::practice::get_leaderboard))
        .route(
            "/practice/{game}/questions",
            get(handlers::practice::get_questions).put(handlers::practice::publish_questions),
        )
        .route("/practice/{game}/players", post(handlers::practice::register_player))
        .route("/practice/{game}/answers", post(handlers::practice::submit_answer))
        .route("/practice/{game}/complete", post(handlers::practice::complete))
}
