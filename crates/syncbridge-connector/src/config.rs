//! Mapping store client configuration.

use std::env;
use std::time::Duration;

use crate::error::{ConnectorError, ConnectorResult};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the mapping store API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the API (trailing slash is stripped by the client).
    pub base_url: String,
    /// Per-request timeout. A timeout is reported as a transient failure.
    pub timeout: Duration,
    /// Static bearer token, if the API requires one.
    pub bearer_token: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `MAPPING_API_BASE_URL`: Base URL of the mapping store
    ///
    /// Optional:
    /// - `MAPPING_API_TIMEOUT_SECS`: Request timeout (default: 10)
    /// - `MAPPING_API_TOKEN`: Bearer token sent with every request
    pub fn from_env() -> ConnectorResult<Self> {
        let base_url =
            env::var("MAPPING_API_BASE_URL").map_err(|_| ConnectorError::ConfigMissing {
                var: "MAPPING_API_BASE_URL".to_string(),
            })?;

        let timeout_secs = match env::var("MAPPING_API_TIMEOUT_SECS") {
            Ok(v) => v.parse::<u64>().map_err(|e| ConnectorError::ConfigInvalid {
                var: "MAPPING_API_TIMEOUT_SECS".to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let bearer_token = env::var("MAPPING_API_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            bearer_token,
        })
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    bearer_token: Option<String>,
}

impl ClientConfigBuilder {
    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the bearer token.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ConnectorResult<ClientConfig> {
        let base_url = self.base_url.ok_or_else(|| ConnectorError::ConfigMissing {
            var: "base_url".to_string(),
        })?;

        Ok(ClientConfig {
            base_url,
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            bearer_token: self.bearer_token,
        })
    }
}
