//! Error types for the common library.
//!
//! This module provides a unified error hierarchy using `thiserror` for consistent
//! error handling across the Gaia MCP crates.
//!
//! # Error Categories
//!
//! - `ConfigError`: Missing or invalid configuration
//! - `Error::Api`: Gaia API errors (includes endpoint and status)
//! - `Error::Timeout`: Upstream request took longer than the gateway allows
//! - `Error::SubscriptionExpired`: The caller's Gaia plan has ended
//! - `Error::Validation`: Input validation failures
//! - `Error::Io` / `Error::Json`: Local I/O and serialization failures

use thiserror::Error;

/// Public Gaia web app, used in user-facing hints.
pub const GAIA_WEB_URL: &str = "https://protogaia.com";

/// Unified error type for the common library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (missing values, invalid values)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// API errors with endpoint and HTTP status context
    ///
    /// `status_code` is 0 when no HTTP response was received.
    #[error("API error for {endpoint} (HTTP {status_code}): {message}")]
    Api {
        /// The API endpoint that was called
        endpoint: String,
        /// HTTP status code returned by the API
        status_code: u16,
        /// Error message from the API or describing the failure
        message: String,
    },

    /// The upstream request timed out. Generation may still be running on Gaia.
    #[error(
        "Your image generation may take longer than expected and still be running on Gaia. \
         Please check your creation page to see the results at {GAIA_WEB_URL}/my-creations"
    )]
    Timeout,

    /// The caller's subscription has ended.
    #[error(
        "Your subscription has ended. Please update to access features here: \
         {GAIA_WEB_URL}/settings/account?tab=Plans&plan=subscription"
    )]
    SubscriptionExpired,

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// File system I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new API error with endpoint, status code, and message.
    ///
    /// # Example
    ///
    /// ```
    /// use gaia_mcp_common::error::Error;
    ///
    /// let endpoint = "https://api.protogaia.com/api/sd-styles";
    /// let err = Error::api(endpoint, 500, "Internal server error");
    /// assert!(err.to_string().contains("api.protogaia.com"));
    /// assert!(err.to_string().contains("500"));
    /// ```
    pub fn api(endpoint: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Error::Api {
            endpoint: endpoint.into(),
            status_code,
            message: message.into(),
        }
    }

    /// Create a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Classify a failed upstream HTTP response.
    ///
    /// A 400 whose body starts with "your subscription has ended" becomes
    /// [`Error::SubscriptionExpired`]; anything else is an [`Error::Api`].
    ///
    /// ```
    /// use gaia_mcp_common::error::Error;
    ///
    /// let err = Error::from_status("/api/recipe", 400, "Your subscription has ended.");
    /// assert!(matches!(err, Error::SubscriptionExpired));
    ///
    /// let err = Error::from_status("/api/recipe", 502, "bad gateway");
    /// assert!(matches!(err, Error::Api { status_code: 502, .. }));
    /// ```
    pub fn from_status(
        endpoint: impl Into<String>,
        status_code: u16,
        body: impl Into<String>,
    ) -> Self {
        let body = body.into();
        if status_code == 400
            && body
                .trim_start()
                .to_lowercase()
                .starts_with("your subscription has ended")
        {
            return Error::SubscriptionExpired;
        }
        Error::api(endpoint, status_code, body)
    }

    /// Whether this error should be reported as a timeout to the caller.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Api { message, .. } => {
                let message = message.to_lowercase();
                message.contains("timeout") || message.contains("timed out")
            }
            _ => false,
        }
    }
}

/// Configuration errors.
///
/// These errors occur when assembling configuration from command-line
/// flags, environment variables and defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value was not supplied by any source
    #[error("{0} is required")]
    MissingValue(String),

    /// A value was supplied but could not be used
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    /// Create a new missing value error.
    pub fn missing_value(name: impl Into<String>) -> Self {
        ConfigError::MissingValue(name.into())
    }

    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }
}

/// Result type alias using the unified Error type.
pub type Result<T> = std::result::Result<T, Error>;
