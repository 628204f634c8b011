//! Configuration module for expense-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct ExpenseConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    /// Users admitted to the pipeline. Empty admits everyone.
    pub allowed_user_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl ExpenseConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required")))?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "expense-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: validate_database_url(database_url)?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            allowed_user_ids: parse_allowed_user_ids(
                &env::var("ALLOWED_USER_IDS").unwrap_or_default(),
            )?,
        })
    }
}

/// Only Postgres URLs are accepted.
pub fn validate_database_url(url: String) -> Result<String, AppError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(url)
    } else {
        Err(AppError::ConfigError(anyhow::anyhow!(
            "DATABASE_URL must start with postgres:// or postgresql://"
        )))
    }
}

/// Parse a comma-separated list of positive user ids.
pub fn parse_allowed_user_ids(raw: &str) -> Result<Vec<i64>, AppError> {
    core_config::split_list(raw)
        .into_iter()
        .map(|item| match item.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(AppError::ConfigError(anyhow::anyhow!(
                "ALLOWED_USER_IDS contains an invalid user id: '{}'",
                item
            ))),
        })
        .collect()
}
