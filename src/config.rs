//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub orders: OrderConfig,
    pub scheduler: SchedulerConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Order intake and customer-token settings
#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// Human-facing order number prefix, e.g. `TO` in `TO-2318`
    pub number_prefix: String,
    /// First sequence number used when no orders exist yet
    pub number_base: i64,
    /// Currency every order is priced in
    pub currency: String,
    /// Secret used to sign customer status tokens
    pub token_secret: String,
    /// Validity window of a status token
    pub token_ttl: Duration,
}

/// Delayed-job scheduler and reconciliation settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often each worker polls for due jobs
    pub poll_interval: Duration,
    /// Number of concurrent job-runner workers
    pub worker_count: usize,
    /// Retry budget per job before it is abandoned
    pub max_attempts: i32,
    /// Base delay for exponential retry backoff
    pub retry_backoff_base: Duration,
    /// First status-check horizon after link creation
    pub status_check_short: Duration,
    /// Second status-check horizon after link creation
    pub status_check_long: Duration,
    /// How long before a provider-side link expiry the revoke job fires
    pub expiry_safety_margin: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            orders: OrderConfig::from_env()?,
            scheduler: SchedulerConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.orders.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env_u64("DB_CONNECTION_TIMEOUT", 30)?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }
        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }
        Ok(())
    }
}

impl OrderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(OrderConfig {
            number_prefix: env::var("ORDER_NUMBER_PREFIX").unwrap_or_else(|_| "TO".to_string()),
            number_base: env::var("ORDER_NUMBER_BASE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ORDER_NUMBER_BASE".to_string()))?,
            currency: env::var("ORDER_CURRENCY").unwrap_or_else(|_| "NOK".to_string()),
            token_secret: env::var("ORDER_TOKEN_SECRET")
                .map_err(|_| ConfigError::MissingVariable("ORDER_TOKEN_SECRET".to_string()))?,
            token_ttl: Duration::from_secs(env_u64("ORDER_TOKEN_TTL_SECS", 3600)?),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.number_prefix.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ORDER_NUMBER_PREFIX cannot be empty".to_string(),
            ));
        }
        if self.number_base < 0 {
            return Err(ConfigError::InvalidValue(
                "ORDER_NUMBER_BASE must be non-negative".to_string(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "ORDER_CURRENCY cannot be empty".to_string(),
            ));
        }
        if self.token_secret.len() < 16 {
            return Err(ConfigError::InvalidValue(
                "ORDER_TOKEN_SECRET must be at least 16 bytes".to_string(),
            ));
        }
        if self.token_ttl.as_secs() == 0 {
            return Err(ConfigError::InvalidValue(
                "ORDER_TOKEN_TTL_SECS cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SchedulerConfig {
            poll_interval: Duration::from_secs(env_u64("JOB_POLL_INTERVAL_SECS", 5)?),
            worker_count: env::var("JOB_WORKER_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JOB_WORKER_COUNT".to_string()))?,
            max_attempts: env::var("JOB_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JOB_MAX_ATTEMPTS".to_string()))?,
            retry_backoff_base: Duration::from_secs(env_u64("JOB_RETRY_BACKOFF_BASE_SECS", 30)?),
            status_check_short: Duration::from_secs(env_u64("STATUS_CHECK_SHORT_SECS", 300)?),
            status_check_long: Duration::from_secs(env_u64("STATUS_CHECK_LONG_SECS", 3600)?),
            expiry_safety_margin: Duration::from_secs(env_u64("EXPIRY_SAFETY_MARGIN_SECS", 120)?),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidValue("JOB_WORKER_COUNT".to_string()));
        }
        if self.max_attempts <= 0 {
            return Err(ConfigError::InvalidValue("JOB_MAX_ATTEMPTS".to_string()));
        }
        if self.status_check_short >= self.status_check_long {
            return Err(ConfigError::InvalidValue(
                "STATUS_CHECK_SHORT_SECS must be < STATUS_CHECK_LONG_SECS".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_config() -> OrderConfig {
        OrderConfig {
            number_prefix: "TO".to_string(),
            number_base: 1000,
            currency: "NOK".to_string(),
            token_secret: "0123456789abcdef0123456789abcdef".to_string(),
            token_ttl: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_order_config_rejects_short_secret() {
        let mut config = order_config();
        config.token_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scheduler_horizons_must_be_ordered() {
        let config = SchedulerConfig {
            poll_interval: Duration::from_secs(5),
            worker_count: 4,
            max_attempts: 3,
            retry_backoff_base: Duration::from_secs(30),
            status_check_short: Duration::from_secs(3600),
            status_check_long: Duration::from_secs(300),
            expiry_safety_margin: Duration::from_secs(120),
        };
        assert!(config.validate().is_err());
    }
}
