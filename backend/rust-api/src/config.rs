use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Redis => "redis",
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(config::ConfigError::Message(format!(
                "unknown store backend '{}' (expected 'memory' or 'redis')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub store_backend: StoreBackend,
    pub redis_uri: String,
    pub store_key_prefix: String,
    pub store_poll_interval_ms: u64,
    pub payout_endpoint_url: Option<String>,
    pub payout_timeout_secs: u64,
    pub explorer_tx_base_url: String,
    pub free_countdown_secs: u32,
    pub paid_countdown_secs: u32,
    pub host_countdown_secs: u32,
    pub reserved_usernames: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            store_backend: StoreBackend::Memory,
            redis_uri: "redis://127.0.0.1:6379/0".to_string(),
            store_key_prefix: "triviabase".to_string(),
            store_poll_interval_ms: 250,
            payout_endpoint_url: None,
            payout_timeout_secs: 30,
            explorer_tx_base_url: "https://sepolia.arbiscan.io/tx/".to_string(),
            free_countdown_secs: 15,
            paid_countdown_secs: 20,
            host_countdown_secs: 20,
            reserved_usernames: vec!["clement".to_string()],
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{APP_ENV}.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let string = |key: &str, var: &str, default: &str| -> String {
            settings
                .get_string(key)
                .or_else(|_| env::var(var))
                .unwrap_or_else(|_| default.to_string())
        };
        let number = |key: &str, var: &str, default: u64| -> Result<u64, config::ConfigError> {
            match settings.get_int(key) {
                Ok(value) => u64::try_from(value)
                    .map_err(|_| config::ConfigError::Message(format!("{} must be positive", key))),
                Err(_) => match env::var(var) {
                    Ok(raw) => raw.parse().map_err(|_| {
                        config::ConfigError::Message(format!("{} must be a number", var))
                    }),
                    Err(_) => Ok(default),
                },
            }
        };
        let seconds = |key: &str, var: &str, default: u32| -> Result<u32, config::ConfigError> {
            let value = number(key, var, u64::from(default))?;
            u32::try_from(value)
                .map_err(|_| config::ConfigError::Message(format!("{} is out of range", key)))
        };

        let store_backend = string("store.backend", "STORE_BACKEND", "redis").parse()?;

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let payout_endpoint_url = settings
            .get_string("payout.endpoint_url")
            .or_else(|_| env::var("PAYOUT_ENDPOINT_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        let reserved_usernames = settings
            .get_string("game.reserved_usernames")
            .or_else(|_| env::var("RESERVED_USERNAMES"))
            .map(|raw| {
                raw.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.reserved_usernames);

        Ok(Config {
            bind_addr: string("server.bind_addr", "BIND_ADDR", &defaults.bind_addr),
            store_backend,
            redis_uri,
            store_key_prefix: string(
                "store.key_prefix",
                "STORE_KEY_PREFIX",
                &defaults.store_key_prefix,
            ),
            store_poll_interval_ms: number(
                "store.poll_interval_ms",
                "STORE_POLL_INTERVAL_MS",
                defaults.store_poll_interval_ms,
            )?,
            payout_endpoint_url,
            payout_timeout_secs: number(
                "payout.timeout_secs",
                "PAYOUT_TIMEOUT_SECS",
                defaults.payout_timeout_secs,
            )?,
            explorer_tx_base_url: string(
                "payout.explorer_tx_base_url",
                "EXPLORER_TX_BASE_URL",
                &defaults.explorer_tx_base_url,
            ),
            free_countdown_secs: seconds(
                "game.free_countdown_secs",
                "FREE_COUNTDOWN_SECS",
                defaults.free_countdown_secs,
            )?,
            paid_countdown_secs: seconds(
                "game.paid_countdown_secs",
                "PAID_COUNTDOWN_SECS",
                defaults.paid_countdown_secs,
            )?,
            host_countdown_secs: seconds(
                "game.host_countdown_secs",
                "HOST_COUNTDOWN_SECS",
                defaults.host_countdown_secs,
            )?,
            reserved_usernames,
        })
    }

    pub fn store_poll_interval(&self) -> Duration {
        Duration::from_millis(self.store_poll_interval_ms)
    }

    pub fn is_reserved_username(&self, username: &str) -> bool {
        self.reserved_usernames
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(username))
    }
}
