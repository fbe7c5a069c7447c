#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use triviabase_api::{
    config::Config,
    create_router,
    errors::PayoutError,
    services::{AppState, PayoutGateway},
    store::MemoryStore,
};

pub const TEST_TX_HASH: &str = "0xfeedbeef";

/// Payout gateway that records every address list it is asked to pay.
#[derive(Default)]
pub struct RecordingGateway {
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingGateway {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PayoutGateway for RecordingGateway {
    async fn distribute(&self, addresses: &[String]) -> Result<String, PayoutError> {
        self.calls.lock().unwrap().push(addresses.to_vec());
        Ok(TEST_TX_HASH.to_string())
    }
}

pub fn test_config() -> Config {
    Config::default()
}

pub async fn create_test_app() -> Router {
    create_test_app_with_gateway().await.0
}

/// Router over a fresh in-memory store, plus the fake payout gateway it uses.
pub async fn create_test_app_with_gateway() -> (Router, Arc<RecordingGateway>) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let gateway = Arc::new(RecordingGateway::default());
    let app_state = Arc::new(AppState::with_parts(
        test_config(),
        Arc::new(MemoryStore::new()),
        Some(gateway.clone() as Arc<dyn PayoutGateway>),
    ));

    (create_router(app_state), gateway)
}

/// Sends one request and returns the status with the body as JSON. Plain
/// text error bodies come back as a JSON string.
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

pub fn question(text: &str, options: [&str; 4], correct: u8) -> Value {
    serde_json::json!({
        "text": text,
        "options": options,
        "correctAnswer": correct,
    })
}
