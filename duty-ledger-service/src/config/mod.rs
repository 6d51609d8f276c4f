//! Configuration module for duty-ledger-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct DutyLedgerConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    /// `LOG_LEVEL`, else `APP__LOG_LEVEL`.
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    /// Run the posting reconciliation sweep once after migrations.
    pub reconcile_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DutyLedgerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "duty-ledger-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| common.log_level.clone()),
            otlp_endpoint: env::var("OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty())
                .or_else(|| common.otlp_endpoint.clone()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parse_or("DATABASE_MIN_CONNECTIONS", 2),
            },
            reconcile_on_startup: parse_or("RECONCILE_ON_STARTUP", false),
            common,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
