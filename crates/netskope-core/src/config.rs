//! Configuration structures for Netskope clients.
//!
//! [`NetskopeClientConfig`] carries the tenant URL, the API token and the
//! transport settings. It is built once, validated, and then handed to the
//! client builders; nothing mutates it afterwards.

use crate::client::{ClientConfig, RetryPolicy};
use crate::Error;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Environment variable holding the tenant URL.
pub const ENV_BASE_URL: &str = "NS_BaseURL";

/// Environment variable holding the API v2 token.
pub const ENV_API_TOKEN: &str = "NS_ApiToken";

/// Configuration for a Netskope client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NetskopeClientConfig {
    /// Tenant URL, e.g. `https://example-tenant.goskope.com`
    #[validate(url)]
    pub base_url: String,

    /// API v2 token. Never serialized.
    #[serde(skip_serializing, deserialize_with = "crate::lenient::secret_string")]
    pub api_token: SecretString,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retry settings
    #[validate(nested)]
    #[serde(default)]
    pub retry: RetryConfig,
}

const fn default_request_timeout_secs() -> u64 {
    60
}

impl NetskopeClientConfig {
    /// Create a new client configuration with required parameters.
    ///
    /// The base URL is used as given; no trailing slash is added or removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, Error> {
        let config = Self {
            base_url: base_url.into(),
            api_token: SecretString::from(api_token.into()),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Build a configuration from `NS_BaseURL` and `NS_ApiToken`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is missing or the URL is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var(ENV_BASE_URL)
            .map_err(|_| Error::ConfigError(format!("{ENV_BASE_URL} is not set")))?;
        let api_token = std::env::var(ENV_API_TOKEN)
            .map_err(|_| Error::ConfigError(format!("{ENV_API_TOKEN} is not set")))?;
        Self::new(base_url, api_token)
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set retry settings.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Transport settings derived from this configuration.
    #[must_use]
    pub fn http_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_timeout(self.timeout())
            .with_retry_policy(self.retry.to_policy())
    }
}

/// Retry settings for transient failures such as rate limiting.
///
/// Waits are whole seconds. Retries are off unless `enabled` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_retry_bounds"))]
pub struct RetryConfig {
    /// Whether failed requests are retried at all
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of retries after the first attempt
    #[validate(range(max = 1000))]
    #[serde(default = "default_retry_max")]
    pub retry_max: u32,

    /// Minimum wait between attempts, in seconds
    #[serde(default = "default_retry_wait_min_secs")]
    pub retry_wait_min_secs: u64,

    /// Maximum wait between attempts, in seconds
    #[validate(range(max = 3600))]
    #[serde(default = "default_retry_wait_max_secs")]
    pub retry_wait_max_secs: u64,
}

const fn default_retry_max() -> u32 {
    100
}

const fn default_retry_wait_min_secs() -> u64 {
    5
}

const fn default_retry_wait_max_secs() -> u64 {
    20
}

fn validate_retry_bounds(config: &RetryConfig) -> std::result::Result<(), ValidationError> {
    if config.retry_wait_min_secs > config.retry_wait_max_secs {
        return Err(ValidationError::new("retry_wait_min_exceeds_max"));
    }
    Ok(())
}

impl RetryConfig {
    /// Retry settings with the default bounds (100 retries, 5s..20s), disabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: false,
            retry_max: default_retry_max(),
            retry_wait_min_secs: default_retry_wait_min_secs(),
            retry_wait_max_secs: default_retry_wait_max_secs(),
        }
    }

    /// Enable retries with the current bounds.
    #[must_use]
    pub const fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub const fn with_retry_max(mut self, retries: u32) -> Self {
        self.retry_max = retries;
        self
    }

    /// Set the wait bounds in seconds.
    #[must_use]
    pub const fn with_wait_bounds(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.retry_wait_min_secs = min_secs;
        self.retry_wait_max_secs = max_secs;
        self
    }

    /// Convert to the transport's retry policy.
    #[must_use]
    pub const fn to_policy(&self) -> RetryPolicy {
        if !self.enabled {
            return RetryPolicy::no_retry();
        }
        RetryPolicy::new()
            .with_max_retries(self.retry_max)
            .with_initial_delay(Duration::from_secs(self.retry_wait_min_secs))
            .with_max_delay(Duration::from_secs(self.retry_wait_max_secs))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}
