//! Configuration management for Envelope.
//!
//! All configuration is driven by environment variables.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Runtime environment the handlers execute in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Error payloads carry stack output.
    Development,
    /// Error payloads carry only the message.
    #[default]
    Production,
}

impl Environment {
    /// Returns the lowercase name of the environment.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(CoreError::Config(format!("unknown environment: {other}"))),
        }
    }
}

/// Global configuration for Envelope.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeConfig {
    /// Runtime environment.
    pub environment: Environment,
    /// Log level.
    pub log_level: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: "info".to_owned(),
        }
    }
}

impl EnvelopeConfig {
    /// Load configuration from environment variables.
    ///
    /// An unrecognized `ENVELOPE_ENV` value is logged and the default is kept.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("ENVELOPE_ENV") {
            match v.parse() {
                Ok(env) => config.environment = env,
                Err(err) => tracing::warn!(%err, "ignoring ENVELOPE_ENV"),
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Whether error payloads should include stack output.
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}
