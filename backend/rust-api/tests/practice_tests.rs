use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::{create_test_app, question, send};

#[tokio::test]
async fn test_practice_game_round() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/practice/geo/questions",
        Some(json!([
            question("Capital of France?", ["Rome", "Paris", "Oslo", "Bern"], 1),
            question("Capital of Norway?", ["Rome", "Paris", "Oslo", "Bern"], 2),
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["questionCount"], 2);

    let (_, questions) = send(&app, "GET", "/api/v1/practice/geo/questions", None).await;
    assert_eq!(questions.as_array().unwrap().len(), 2);
    assert!(!questions.to_string().contains("correctAnswer"));

    let (status, player) = send(&app, "POST", "/api/v1/practice/geo/players", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let username = player["username"].as_str().unwrap().to_string();
    assert!(username.starts_with("TRB"));

    let (_, result) = send(
        &app,
        "POST",
        "/api/v1/practice/geo/answers",
        Some(json!({ "username": username, "questionIndex": 0, "answer": 1, "timeLeft": 20 })),
    )
    .await;
    assert_eq!(result["scoreAwarded"], 10);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/practice/geo/complete",
        Some(json!({ "username": username })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/practice/geo/players",
        Some(json!({ "username": username })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, board) = send(&app, "GET", "/api/v1/practice/leaderboard", None).await;
    assert_eq!(board[0]["username"], username.as_str());
    assert_eq!(board[0]["score"], 10);
}

#[tokio::test]
async fn test_reserved_game_name_is_rejected() {
    let app = create_test_app().await;
    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/practice/participation/questions",
        Some(json!([question("q", ["a", "b", "c", "d"], 0)])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
