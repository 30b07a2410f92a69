use std::{path::PathBuf, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::Level;

use crate::{analysis::SettleStrategy, error::ConfigError};

pub const DEFAULT_REMOTE_BASE_URL: &str = "https://unitinerant-shavonda-prosaically.ngrok-free.dev";
const CONFIG_FILE: &str = "formation_analyzer";
const ENV_PREFIX: &str = "FORMATION";

/// How the client waits for the remote service to publish result images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessMode {
    Fixed,
    Poll,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub remote_base_url: String,
    pub bind_address: String,
    pub settle_delay_ms: u64,
    pub readiness: ReadinessMode,
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub placeholder_detection: String,
    pub placeholder_formation: String,
    pub download_dir: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            settle_delay_ms: 1500,
            readiness: ReadinessMode::Fixed,
            poll_interval_ms: 250,
            poll_attempts: 20,
            request_timeout_secs: 60,
            log_level: "info".to_string(),
            placeholder_detection: "/team-detection.jpg".to_string(),
            placeholder_formation: "/team-formation.jpg".to_string(),
            download_dir: PathBuf::from("."),
        }
    }
}

impl Configuration {
    /// Layers defaults, an optional `formation_analyzer.toml` and
    /// `FORMATION_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let configuration: Configuration = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = url::Url::parse(&self.remote_base_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "remote base url '{}' is not absolute: {}",
                self.remote_base_url, e
            ))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "remote base url must be http or https, got '{}'",
                base.scheme()
            )));
        }

        if self.readiness == ReadinessMode::Poll {
            if self.poll_interval_ms == 0 {
                return Err(ConfigError::Invalid(
                    "Poll interval must be greater than 0".to_string(),
                ));
            }
            if self.poll_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "Poll attempts must be greater than 0".to_string(),
                ));
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn settle_strategy(&self) -> SettleStrategy {
        match self.readiness {
            ReadinessMode::Fixed => {
                SettleStrategy::FixedDelay(Duration::from_millis(self.settle_delay_ms))
            }
            ReadinessMode::Poll => SettleStrategy::Poll {
                interval: Duration::from_millis(self.poll_interval_ms),
                attempts: self.poll_attempts,
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    // Unknown levels fall back to INFO.
    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_valid() {
        let configuration = Configuration::default();
        assert!(configuration.validate().is_ok());
        assert_eq!(
            configuration.settle_strategy(),
            SettleStrategy::FixedDelay(Duration::from_millis(1500))
        );
        assert_eq!(configuration.log_level(), Level::INFO);
    }

    #[test]
    fn test_relative_base_url_is_rejected() {
        let configuration = Configuration {
            remote_base_url: "/process".to_string(),
            ..Configuration::default()
        };
        assert!(matches!(
            configuration.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_poll_mode_requires_attempts() {
        let configuration = Configuration {
            readiness: ReadinessMode::Poll,
            poll_attempts: 0,
            ..Configuration::default()
        };
        assert!(configuration.validate().is_err());

        let configuration = Configuration {
            readiness: ReadinessMode::Poll,
            ..Configuration::default()
        };
        assert_eq!(
            configuration.settle_strategy(),
            SettleStrategy::Poll {
                interval: Duration::from_millis(250),
                attempts: 20,
            }
        );
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let configuration = Configuration {
            log_level: "loud".to_string(),
            ..Configuration::default()
        };
        assert_eq!(configuration.log_level(), Level::INFO);

        let configuration = Configuration {
            log_level: "debug".to_string(),
            ..Configuration::default()
        };
        assert_eq!(configuration.log_level(), Level::DEBUG);
    }
}
