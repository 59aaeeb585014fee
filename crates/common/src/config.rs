use std::time::Duration;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen port
    pub port: u16,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Origin allowed by CORS (the dashboard frontend)
    pub frontend_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Telegram Bot API base URL (overridable for local stubs)
    pub telegram_api_base_url: String,

    /// Per-call timeout for a single sendMessage request in milliseconds (default: 5000)
    pub telegram_send_timeout_ms: u64,

    /// Delivery attempts per order before the send is marked failed (default: 3)
    pub telegram_max_attempts: u32,

    /// Linear backoff unit between attempts in milliseconds (default: 500)
    pub telegram_retry_base_delay_ms: u64,

    /// How long in-flight HTTP requests may drain on shutdown (default: 5)
    pub shutdown_grace_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid u16"))?,
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            telegram_api_base_url: std::env::var("TELEGRAM_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            telegram_send_timeout_ms: std::env::var("TELEGRAM_SEND_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TELEGRAM_SEND_TIMEOUT_MS must be a valid u64"))?,
            telegram_max_attempts: std::env::var("TELEGRAM_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TELEGRAM_MAX_ATTEMPTS must be a valid u32"))?,
            telegram_retry_base_delay_ms: std::env::var("TELEGRAM_RETRY_BASE_DELAY_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("TELEGRAM_RETRY_BASE_DELAY_MS must be a valid u64")
                })?,
            shutdown_grace_secs: std::env::var("SHUTDOWN_GRACE_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SHUTDOWN_GRACE_SECS must be a valid u64"))?,
        })
    }

    pub fn telegram_send_timeout(&self) -> Duration {
        Duration::from_millis(self.telegram_send_timeout_ms)
    }

    pub fn telegram_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.telegram_retry_base_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
