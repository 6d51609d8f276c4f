use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings every service reads the same way.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector endpoint; traces stay local when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

impl Config {
    /// Load from an optional `configuration.{toml,yaml,json}` file, then
    /// `APP__*` environment variables (e.g. `APP__PORT=3000`).
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mut loaded: Self = config.try_deserialize()?;
        loaded.otlp_endpoint = loaded.otlp_endpoint.filter(|s| !s.trim().is_empty());
        Ok(loaded)
    }
}
