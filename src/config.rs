use crate::domain::Currency;
use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub database_path: String,
    pub default_currency: Currency,
    pub undo_history_limit: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_addr = env_map
            .get("BIND_ADDR")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BIND_ADDR".to_string(),
                    "must be an IP address".to_string(),
                )
            })?;

        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let default_currency = env_map
            .get("DEFAULT_CURRENCY")
            .map(|s| s.as_str())
            .unwrap_or("EUR")
            .parse::<Currency>()
            .map_err(|e| ConfigError::InvalidValue("DEFAULT_CURRENCY".to_string(), e.to_string()))?;

        let undo_history_limit = match env_map
            .get("UNDO_HISTORY_LIMIT")
            .map(|s| s.as_str())
            .unwrap_or("50")
            .parse::<usize>()
        {
            Ok(limit) if limit > 0 => limit,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "UNDO_HISTORY_LIMIT".to_string(),
                    "must be a positive integer".to_string(),
                ))
            }
        };

        Ok(Config {
            bind_addr,
            port,
            database_path,
            default_currency,
            undo_history_limit,
        })
    }
}
