use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{Config, StoreBackend};
use crate::errors::GameError;
use crate::models::quiz::{InviteCode, Quiz};
use crate::store::{paths, MemoryStore, RedisStore, SessionStore, StoreError, StorePath};

pub mod authoring_service;
pub mod host_service;
pub mod invite_code;
pub mod join_service;
pub mod leaderboard_service;
pub mod payout_service;
pub mod player_service;
pub mod practice_service;

pub use payout_service::{HttpPayoutGateway, PayoutGateway};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub payout_gateway: Option<Arc<dyn PayoutGateway>>,
}

impl AppState {
    /// Connects the configured store backend and payout gateway.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn SessionStore> = match config.store_backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory session store; state is lost on restart");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Redis => Arc::new(connect_redis(&config).await?),
        };

        let payout_gateway: Option<Arc<dyn PayoutGateway>> = match &config.payout_endpoint_url {
            Some(url) => {
                tracing::info!("Payout gateway configured at {}", url);
                Some(Arc::new(HttpPayoutGateway::new(
                    url.clone(),
                    Duration::from_secs(config.payout_timeout_secs),
                )?))
            }
            None => {
                tracing::warn!("PAYOUT_ENDPOINT_URL not set; paid quiz rewards are disabled");
                None
            }
        };

        Ok(Self::with_parts(config, store, payout_gateway))
    }

    /// Assembles state from already-built collaborators (tests, embedding).
    pub fn with_parts(
        config: Config,
        store: Arc<dyn SessionStore>,
        payout_gateway: Option<Arc<dyn PayoutGateway>>,
    ) -> Self {
        Self {
            config,
            store,
            payout_gateway,
        }
    }
}

async fn connect_redis(config: &Config) -> anyhow::Result<RedisStore> {
    tracing::info!("Attempting to connect to Redis...");

    let client = redis::Client::open(config.redis_uri.clone())?;
    let conn = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    tracing::info!("Redis ConnectionManager created, testing with PING...");

    let mut ping_conn = conn.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut ping_conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");

    Ok(RedisStore::new(
        conn,
        config.store_key_prefix.clone(),
        config.store_poll_interval(),
    ))
}

/// Reads the quiz document behind `code`.
pub(crate) async fn load_quiz(
    store: &dyn SessionStore,
    code: &InviteCode,
) -> Result<Quiz, GameError> {
    let path = paths::quiz(code)?;
    let value = store
        .read_once(&path)
        .await?
        .ok_or(GameError::QuizNotFound)?;
    decode(&path, value)
}

pub(crate) fn decode<T: DeserializeOwned>(path: &StorePath, value: Value) -> Result<T, GameError> {
    serde_json::from_value(value).map_err(|e| GameError::corrupt(path, e))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value, GameError> {
    serde_json::to_value(value).map_err(|e| GameError::Store(StoreError::Serialization(e)))
}
