//! Configuration module for loading environment variables and settings.
//!
//! [`Config`] is immutable and only produced by [`ConfigBuilder::build`], after
//! explicit overrides, the environment and defaults have all been applied.

use crate::error::ConfigError;

/// Default Gaia API base URL.
pub const DEFAULT_API_URL: &str = "https://api.protogaia.com";

/// Default port for the SSE transport.
pub const DEFAULT_PORT: u16 = 3000;

/// Default log level when neither `RUST_LOG` nor `LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Gaia API base URL
    pub api_url: String,
    /// Default Gaia API key, used when a call carries no session credential
    pub api_key: Option<String>,
    /// Session store connection string (`redis://` or `rediss://`)
    pub redis_url: Option<String>,
    /// HTTP server port for the SSE transport
    pub port: u16,
    /// Default log level
    pub log_level: String,
}

impl Config {
    /// Start a new builder with no values set.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load configuration from environment variables and .env file.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if PORT is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::builder().with_env()?.build())
    }
}

/// Builder that layers configuration sources.
///
/// Values set explicitly win over the environment; the environment wins over
/// defaults. Environment lookups never overwrite a value that is already set.
/// Empty or blank strings count as unset in every source.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    api_url: Option<String>,
    api_key: Option<String>,
    redis_url: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
}

impl ConfigBuilder {
    /// Override the Gaia API URL. `None` leaves the current value untouched.
    pub fn api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(value) = non_empty(api_url) {
            self.api_url = Some(value);
        }
        self
    }

    /// Override the default API key. `None` leaves the current value untouched.
    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(value) = non_empty(api_key) {
            self.api_key = Some(value);
        }
        self
    }

    /// Override the session store connection string.
    pub fn redis_url(mut self, redis_url: Option<String>) -> Self {
        if let Some(value) = non_empty(redis_url) {
            self.redis_url = Some(value);
        }
        self
    }

    /// Override the SSE port.
    pub fn port(mut self, port: Option<u16>) -> Self {
        if port.is_some() {
            self.port = port;
        }
        self
    }

    /// Override the log level.
    pub fn log_level(mut self, log_level: Option<String>) -> Self {
        if let Some(value) = non_empty(log_level) {
            self.log_level = Some(value);
        }
        self
    }

    /// Fill unset values from the process environment (and `.env`, if present).
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if PORT is not a valid port number.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        self.with_lookup(|name| std::env::var(name).ok())
    }

    /// Fill unset values using `lookup` as the variable source.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if PORT is not a valid port number.
    pub fn with_lookup<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(lookup(name));

        if self.api_url.is_none() {
            self.api_url = var("GAIA_API_URL");
        }
        if self.api_key.is_none() {
            self.api_key = var("GAIA_API_KEY");
        }
        if self.redis_url.is_none() {
            self.redis_url = var("REDIS_URL");
        }
        if self.log_level.is_none() {
            self.log_level = var("LOG_LEVEL");
        }
        if self.port.is_none() {
            if let Some(raw) = var("PORT") {
                let port = raw
                    .trim()
                    .parse::<u16>()
                    .map_err(|e| ConfigError::invalid_value("PORT", format!("'{}': {}", raw, e)))?;
                self.port = Some(port);
            }
        }

        Ok(self)
    }

    /// Produce the final configuration, applying defaults for anything unset.
    pub fn build(self) -> Config {
        Config {
            api_url: self.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: self.api_key,
            redis_url: self.redis_url,
            port: self.port.unwrap_or(DEFAULT_PORT),
            log_level: self
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
