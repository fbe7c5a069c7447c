// Redis-backed store tests. They need a running Redis and are ignored by
// default: `REDIS_URI=redis://127.0.0.1:6379/0 cargo test -- --ignored`
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use triviabase_api::store::{RedisStore, SessionStore, StorePath};

async fn connect() -> RedisStore {
    let redis_uri =
        std::env::var("REDIS_URI").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());
    let client = redis::Client::open(redis_uri).expect("Failed to open Redis client");
    let conn = client
        .get_connection_manager()
        .await
        .expect("Failed to connect to Redis");

    // Every test gets its own key space.
    let prefix = format!("triviabase-test-{}", uuid::Uuid::new_v4());
    RedisStore::new(conn, prefix, Duration::from_millis(20))
}

fn path(raw: &str) -> StorePath {
    StorePath::parse(raw).unwrap()
}

#[tokio::test]
#[ignore]
async fn test_create_if_absent_only_once() {
    let store = connect().await;
    let quiz = path("quizzes/TBF12345");

    assert!(store.create_if_absent(&quiz, json!({ "title": "A" })).await.unwrap());
    assert!(!store.create_if_absent(&quiz, json!({ "title": "B" })).await.unwrap());

    let stored = store.read_once(&quiz).await.unwrap().unwrap();
    assert_eq!(stored["title"], "A");
}

#[tokio::test]
#[ignore]
async fn test_concurrent_increments_are_not_lost() {
    let store = Arc::new(connect().await);
    let score = path("quizzes/TBF12345/participants/Alice/score");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let score = score.clone();
            tokio::spawn(async move { store.increment(&score, 5).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.read_once(&score).await.unwrap(), Some(json!(40)));
}

#[tokio::test]
#[ignore]
async fn test_merge_if_respects_the_guard() {
    let store = connect().await;
    let quiz = path("quizzes/TBF12345");
    store
        .write(&quiz, json!({ "title": "A", "current_question": 0 }))
        .await
        .unwrap();

    let mut fields = Map::new();
    fields.insert("current_question".to_string(), json!(1));
    let at_first = |stored: Option<&Value>| {
        stored.and_then(|q| q.get("current_question")) == Some(&json!(0))
    };

    assert!(store.merge_if(&quiz, fields.clone(), &at_first).await.unwrap());
    assert!(!store.merge_if(&quiz, fields, &at_first).await.unwrap());

    let stored = store.read_once(&quiz).await.unwrap().unwrap();
    assert_eq!(stored["current_question"], 1);
    assert_eq!(stored["title"], "A");
}

#[tokio::test]
#[ignore]
async fn test_subscription_sees_later_writes() {
    let store = connect().await;
    let phase = path("quizzes/TBF12345/phase");
    store.write(&phase, json!({ "status": "idle" })).await.unwrap();

    let mut updates = store.subscribe(&phase).await.unwrap();
    assert_eq!(
        updates.next().await.unwrap(),
        Some(json!({ "status": "idle" }))
    );

    store.write(&phase, json!({ "status": "finished" })).await.unwrap();
    let next = tokio::time::timeout(Duration::from_secs(2), updates.next())
        .await
        .expect("No update within 2s")
        .unwrap();
    assert_eq!(next, Some(json!({ "status": "finished" })));
}

#[tokio::test]
#[ignore]
async fn test_ping() {
    let store = connect().await;
    store.ping().await.unwrap();
}
