//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL. When absent the service runs on the
    /// in-memory ledger alone (required in production).
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Minimum days between profit accruals for the same account/deposit
    pub accrual_min_interval_days: i64,

    /// Lower bound for the early-withdrawal breakage coefficient
    pub breakage_floor: Decimal,

    /// Day-count denominator for deposit profit
    pub year_length_days: i64,

    /// Scheduler tick for the snapshot/accrual job
    pub scheduler_tick_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").ok();

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let accrual_min_interval_days = env::var("ACCRUAL_MIN_INTERVAL_DAYS")
            .unwrap_or_else(|_| "28".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("ACCRUAL_MIN_INTERVAL_DAYS"))?;

        let breakage_floor = env::var("BREAKAGE_FLOOR")
            .map(|raw| Decimal::from_str(&raw))
            .unwrap_or_else(|_| Decimal::from_str("0.1"))
            .map_err(|_| ConfigError::InvalidValue("BREAKAGE_FLOOR"))?;

        let year_length_days = env::var("YEAR_LENGTH_DAYS")
            .unwrap_or_else(|_| "365".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("YEAR_LENGTH_DAYS"))?;

        let scheduler_tick_secs = env::var("SCHEDULER_TICK_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("SCHEDULER_TICK_SECS"))?;

        let config = Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            accrual_min_interval_days,
            breakage_floor,
            year_length_days,
            scheduler_tick_secs,
        };

        // Running without a journal is a development convenience only.
        if config.is_production() && config.database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }

        Ok(config)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
