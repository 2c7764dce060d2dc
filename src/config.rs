use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EngagementError, Result};
use crate::store::DataSource;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub model: ModelConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `live` or `fallback`
    pub data_source: String,
    pub database_url: String,
    pub max_connections: u32,
    /// YAML dataset for the fallback store; built-in sample data when unset
    pub fixture_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// User id written on interaction entries logged by the pipeline
    pub system_user_id: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_source: "live".to_string(),
            database_url: "data/engagement.db".to_string(),
            max_connections: 10,
            fixture_path: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout_ms: 8_000,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: "https://autowebhook.contatocrescieperdi.com.br/webhook/teste_ia_assistente".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            format: "text".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            system_user_id: "system".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            model: ModelConfig::default(),
            webhook: WebhookConfig::default(),
            logging: LoggingConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Hard timeout of one model call
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl WebhookConfig {
    /// Hard timeout of one webhook call
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Same as [`AppConfig::load`], with an extra explicit file layered last
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("engagement").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let config = builder
            // ENGAGEMENT__MODEL__API_KEY -> model.api_key
            .add_source(Environment::with_prefix("ENGAGEMENT").separator("__"))
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let source: DataSource = self.store.data_source.parse()?;
        if source == DataSource::Live && self.store.database_url.trim().is_empty() {
            return Err(invalid("database_url is required for the live data source"));
        }
        if self.store.max_connections == 0 {
            return Err(invalid("max_connections must be greater than 0"));
        }

        if self.model.model.trim().is_empty() {
            return Err(invalid("model name cannot be empty"));
        }
        if self.model.timeout_ms == 0 {
            return Err(invalid("model timeout_ms must be greater than 0"));
        }
        if self.webhook.timeout_ms == 0 {
            return Err(invalid("webhook timeout_ms must be greater than 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        if self.service.system_user_id.trim().is_empty() {
            return Err(invalid("system_user_id cannot be empty"));
        }

        Ok(())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}

fn invalid(message: impl Into<String>) -> EngagementError {
    EngagementError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store.data_source, "live");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.model.timeout(), Duration::from_secs(8));
        assert_eq!(config.service.system_user_id, "system");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.store.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.store.data_source = "mock".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.model.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fallback_store_does_not_need_a_database_url() {
        let mut config = AppConfig::default();
        config.store.data_source = "fallback".to_string();
        config.store.database_url = String::new();
        assert!(config.validate().is_ok());
    }
}
