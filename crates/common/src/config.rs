use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::types::PayloadEncoding;

/// Deployment environment. Selects the logging preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Dev,
    Prod,
}

impl Environment {
    /// Parse an `APP_ENV` value. Unknown values fall back to `Local`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" => Environment::Dev,
            "prod" => Environment::Prod,
            _ => Environment::Local,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Local => write!(f, "local"),
            Environment::Dev => write!(f, "dev"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

/// RabbitMQ connection and subscription settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AmqpConfig {
    /// Full AMQP URI. Overrides host/port/user/password when set.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Queue to consume from
    pub queue: String,
    /// basic.qos prefetch count (default: 20)
    pub prefetch: u16,
}

impl AmqpConfig {
    /// Connection URI for the broker.
    pub fn uri(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "amqp://{}:{}@{}:{}/%2f",
                self.user, self.password, self.host, self.port
            ),
        }
    }
}

/// Outbound Telegram Bot API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub base_url: String,
    pub token: String,
    /// Per-request timeout in seconds (default: 10)
    pub timeout_secs: u64,
}

impl TelegramConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: Environment,
    pub amqp: AmqpConfig,
    pub telegram: TelegramConfig,

    /// Wire format of inbound payloads
    pub payload_encoding: PayloadEncoding,

    /// Number of dispatch workers (default: 5)
    pub worker_count: usize,

    /// Capacity of the channel between the consumer and the workers (default: 100)
    pub channel_capacity: usize,

    /// Bind address of the liveness probe (default: 0.0.0.0:8080)
    pub health_addr: SocketAddr,

    /// How long shutdown waits for the workers to drain (default: 10)
    pub shutdown_grace_secs: u64,

    /// How long shutdown waits for the liveness server (default: 5)
    pub health_grace_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let worker_count: usize = parse(&var_or("WORKER_COUNT", "5"), "WORKER_COUNT")?;
        if worker_count == 0 {
            return Err(AppError::Config("WORKER_COUNT must be at least 1".to_string()).into());
        }

        let channel_capacity: usize =
            parse(&var_or("CHANNEL_CAPACITY", "100"), "CHANNEL_CAPACITY")?;
        if channel_capacity == 0 {
            return Err(AppError::Config("CHANNEL_CAPACITY must be at least 1".to_string()).into());
        }

        let payload_encoding = var_or("PAYLOAD_ENCODING", "json")
            .parse::<PayloadEncoding>()
            .map_err(|e| AppError::Config(format!("PAYLOAD_ENCODING: {e}")))?;

        Ok(Self {
            env: Environment::parse(&var_or("APP_ENV", "local")),
            amqp: AmqpConfig {
                url: lookup("AMQP_URL"),
                host: var_or("AMQP_HOST", "localhost"),
                port: parse(&var_or("AMQP_PORT", "5672"), "AMQP_PORT")?,
                user: var_or("AMQP_USER", "guest"),
                password: var_or("AMQP_PASSWORD", "guest"),
                queue: required(&lookup, "AMQP_QUEUE")?,
                prefetch: parse(&var_or("AMQP_PREFETCH", "20"), "AMQP_PREFETCH")?,
            },
            telegram: TelegramConfig {
                base_url: var_or("TG_BASE_URL", "https://api.telegram.org"),
                token: required(&lookup, "TG_TOKEN")?,
                timeout_secs: parse(&var_or("DELIVERY_TIMEOUT_SECS", "10"), "DELIVERY_TIMEOUT_SECS")?,
            },
            payload_encoding,
            worker_count,
            channel_capacity,
            health_addr: parse(&var_or("HEALTH_ADDR", "0.0.0.0:8080"), "HEALTH_ADDR")?,
            shutdown_grace_secs: parse(&var_or("SHUTDOWN_GRACE_SECS", "10"), "SHUTDOWN_GRACE_SECS")?,
            health_grace_secs: parse(&var_or("HEALTH_GRACE_SECS", "5"), "HEALTH_GRACE_SECS")?,
        })
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn health_grace(&self) -> Duration {
        Duration::from_secs(self.health_grace_secs)
    }
}

fn parse<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}")))
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{key} environment variable is required")))
}
