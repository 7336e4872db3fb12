use std::env;

use mcpanel_client::{ControlClientConfig, DEFAULT_SCHEMA_PATH, DEFAULT_TIMEOUT_MS};
use mcpanel_core::SessionConfig;
use mcpanel_core::store::DEFAULT_LOG_CAPACITY;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub push_url: String,
    pub timeout_ms: u64,
    pub log_capacity: usize,
    pub schema_path: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid MCPANEL_BASE_URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid MCPANEL_TIMEOUT_MS: {0}")]
    InvalidTimeoutMs(String),
    #[error("invalid MCPANEL_LOG_CAPACITY: {0}")]
    InvalidLogCapacity(String),
}

impl ConsoleConfig {
    /// Reads the environment. `overrides` wins for any key it answers, so
    /// values derived from other keys see the overridden inputs.
    pub fn from_env_with<F>(overrides: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|key| overrides(key).or_else(|| env::var(key).ok()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = non_empty("MCPANEL_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let push_url = match non_empty("MCPANEL_PUSH_URL") {
            Some(url) => url,
            None => derive_push_url(&base_url)?,
        };
        let timeout_ms = non_empty("MCPANEL_TIMEOUT_MS")
            .unwrap_or_else(|| DEFAULT_TIMEOUT_MS.to_string())
            .parse::<u64>()
            .map_err(|error| ConfigError::InvalidTimeoutMs(error.to_string()))?;
        let log_capacity = non_empty("MCPANEL_LOG_CAPACITY")
            .unwrap_or_else(|| DEFAULT_LOG_CAPACITY.to_string())
            .parse::<usize>()
            .map_err(|error| ConfigError::InvalidLogCapacity(error.to_string()))?;
        if log_capacity == 0 {
            return Err(ConfigError::InvalidLogCapacity(
                "must be at least 1".to_string(),
            ));
        }
        let schema_path =
            non_empty("MCPANEL_SCHEMA_PATH").unwrap_or_else(|| DEFAULT_SCHEMA_PATH.to_string());

        Ok(Self {
            base_url,
            push_url,
            timeout_ms,
            log_capacity,
            schema_path,
        })
    }

    #[must_use]
    pub fn client_config(&self) -> ControlClientConfig {
        ControlClientConfig {
            timeout_ms: self.timeout_ms,
            schema_path: self.schema_path.clone(),
            ..ControlClientConfig::new(self.base_url.clone())
        }
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            log_capacity: self.log_capacity,
        }
    }
}

/// `http://host:port` becomes `ws://host:port/events`.
fn derive_push_url(base_url: &str) -> Result<String, ConfigError> {
    let rest = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(ConfigError::InvalidBaseUrl(format!(
            "expected http:// or https://, got {base_url}"
        )));
    };
    Ok(format!("{rest}/events"))
}
