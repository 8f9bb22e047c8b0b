use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: u64,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub url: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_drain: bool,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/activos.db?mode=rwc".to_string(),
                max_connections: 5,
                connection_timeout: 30,
            },
            api: ApiConfig {
                base_url: "http://localhost:3000/api".to_string(),
                request_timeout: 30,
                bearer_token: None,
            },
            realtime: RealtimeConfig {
                url: "ws://localhost:3000/ws".to_string(),
                max_reconnect_attempts: 10,
                reconnect_base_delay_ms: 500,
                reconnect_max_delay_ms: 30_000,
            },
            sync: SyncConfig {
                auto_drain: true,
                max_retries: 3,
                backoff_base_ms: 500,
                backoff_max_ms: 30_000,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("ACTIVOS_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("ACTIVOS_DATABASE_MAX_CONNECTIONS") {
            if let Some(value) = parse_u32(&v) {
                cfg.database.max_connections = value.max(1);
            }
        }

        if let Ok(v) = std::env::var("ACTIVOS_API_BASE_URL") {
            if !v.trim().is_empty() {
                cfg.api.base_url = v;
            }
        }
        if let Ok(v) = std::env::var("ACTIVOS_API_TOKEN") {
            if !v.trim().is_empty() {
                cfg.api.bearer_token = Some(v);
            }
        }
        if let Ok(v) = std::env::var("ACTIVOS_API_TIMEOUT_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.api.request_timeout = value.max(1);
            }
        }

        if let Ok(v) = std::env::var("ACTIVOS_REALTIME_URL") {
            if !v.trim().is_empty() {
                cfg.realtime.url = v;
            }
        }
        if let Ok(v) = std::env::var("ACTIVOS_REALTIME_MAX_RECONNECTS") {
            if let Some(value) = parse_u32(&v) {
                cfg.realtime.max_reconnect_attempts = value.max(1);
            }
        }

        if let Ok(v) = std::env::var("ACTIVOS_SYNC_AUTO_DRAIN") {
            cfg.sync.auto_drain = parse_bool(&v, cfg.sync.auto_drain);
        }
        if let Ok(v) = std::env::var("ACTIVOS_SYNC_MAX_RETRIES") {
            if let Some(value) = parse_u32(&v) {
                cfg.sync.max_retries = value.max(1);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.api.base_url.trim().is_empty() {
            return Err("Api base_url cannot be empty".to_string());
        }
        if self.realtime.url.trim().is_empty() {
            return Err("Realtime url cannot be empty".to_string());
        }
        if self.realtime.max_reconnect_attempts == 0 {
            return Err("Realtime max_reconnect_attempts must be greater than 0".to_string());
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        if self.sync.backoff_base_ms == 0 || self.sync.backoff_base_ms > self.sync.backoff_max_ms {
            return Err("Sync backoff_base_ms must be in 1..=backoff_max_ms".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
