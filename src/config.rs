//! # Configuration Management
//!
//! Loads application configuration from three layered sources:
//! - built-in defaults
//! - an optional `config.toml` file
//! - environment variables (`APP_` prefix, plus a few well-known names)
//!
//! The one service-specific variable is `WHISPER_DOWNLOAD_ROOT`, which points
//! at the directory that model weights are provisioned into ahead of time.
//! The service never downloads weights at request time.

use crate::transcription::ModelSize;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Model selection and weight provisioning settings.
///
/// `download_root` is an hf-hub style cache directory; requests only ever
/// read from it. `default_model` is used when a request omits the `model`
/// form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub download_root: String,
    pub default_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Uploads larger than this are rejected before staging.
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            models: ModelsConfig {
                download_root: "/app/models".to_string(),
                default_model: "small".to_string(),
            },
            limits: LimitsConfig {
                max_upload_bytes: 50 * 1024 * 1024,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration in priority order: defaults, then `config.toml`,
    /// then environment variables. `HOST`/`PORT` are honored for deployment
    /// platforms that set them, and `WHISPER_DOWNLOAD_ROOT` overrides the
    /// model weights directory.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(root) = env::var("WHISPER_DOWNLOAD_ROOT") {
            settings = settings.set_override("models.download_root", root)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations that cannot serve a single request.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.models.download_root.is_empty() {
            return Err(anyhow::anyhow!("Model download root cannot be empty"));
        }

        if self.models.default_model.parse::<ModelSize>().is_err() {
            return Err(anyhow::anyhow!(
                "Default model '{}' is not a valid model size; must be one of: {}",
                self.models.default_model,
                ModelSize::NAMES.join(", ")
            ));
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.models.download_root, "/app/models");
        assert_eq!(config.models.default_model, "small");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_port_zero() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_unknown_default_model() {
        let mut config = AppConfig::default();
        config.models.default_model = "xlarge".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("large-v3"));
    }

    #[test]
    fn test_config_validation_rejects_zero_upload_limit() {
        let mut config = AppConfig::default();
        config.limits.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }
}
