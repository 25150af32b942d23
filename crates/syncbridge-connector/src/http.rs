//! Mapping store HTTP client (reqwest-based).
//!
//! Endpoints:
//! - `GET /mapping/{family}/{keyType}/{id}` → 200 mapping, 404 absent
//! - `POST /mapping/{family}` → 201, or 409 with `existing`/`duplicate`
//! - `PUT /mapping/{family}` → batch of child mapping changes

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::MappingStoreClient;
use crate::types::{ChildMappingBatch, EntityMapping};

/// 409 response body. Some deployments nest the pair under `moreInfo`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConflictBody {
    existing: Option<EntityMapping>,
    duplicate: Option<EntityMapping>,
    more_info: Option<ConflictPair>,
}

#[derive(Debug, Deserialize)]
struct ConflictPair {
    existing: EntityMapping,
    duplicate: EntityMapping,
}

impl ConflictBody {
    fn into_pair(self) -> Option<(EntityMapping, EntityMapping)> {
        match (self.existing, self.duplicate, self.more_info) {
            (Some(existing), Some(duplicate), _) => Some((existing, duplicate)),
            (_, _, Some(pair)) => Some((pair.existing, pair.duplicate)),
            _ => None,
        }
    }
}

/// HTTP implementation of [`MappingStoreClient`].
#[derive(Debug, Clone)]
pub struct HttpMappingStoreClient {
    base_url: String,
    http_client: Client,
    bearer_token: Option<String>,
}

impl HttpMappingStoreClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> ConnectorResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent("syncbridge-connector/0.1")
            .build()
            .map_err(|e| ConnectorError::ConfigInvalid {
                var: "http_client".to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        let mut client = Self::with_http_client(config.base_url.clone(), http_client);
        client.bearer_token = config.bearer_token.clone();
        Ok(client)
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(base_url: String, http_client: Client) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            http_client,
            bearer_token: None,
        }
    }

    /// Send `token` as a bearer credential on every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn error_from_response(&self, response: reqwest::Response) -> ConnectorError {
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let detail = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body
        };

        match status {
            StatusCode::NOT_FOUND => ConnectorError::not_found("mapping", url),
            StatusCode::REQUEST_TIMEOUT => ConnectorError::Timeout { message: detail },
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(url = %url, "Mapping store rate limited");
                ConnectorError::server(status.as_u16(), detail)
            }
            s if s.is_server_error() => ConnectorError::server(s.as_u16(), detail),
            s => ConnectorError::Rejected {
                status: s.as_u16(),
                detail,
            },
        }
    }
}

#[async_trait]
impl MappingStoreClient for HttpMappingStoreClient {
    async fn find_mapping(
        &self,
        family: &str,
        key_type: &str,
        id: &str,
    ) -> ConnectorResult<Option<EntityMapping>> {
        let url = format!("{}/mapping/{}/{}/{}", self.base_url, family, key_type, id);
        debug!("Mapping GET {}", url);

        let response = self.authorize(self.http_client.get(&url)).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.error_from_response(response).await);
        }

        let body = response.text().await?;
        let mapping = serde_json::from_str(&body)
            .map_err(|e| ConnectorError::Parse(format!("Failed to parse mapping: {e}")))?;
        Ok(Some(mapping))
    }

    async fn create_mapping(&self, family: &str, mapping: &EntityMapping) -> ConnectorResult<()> {
        let url = format!("{}/mapping/{}", self.base_url, family);
        debug!("Mapping POST {} ({})", url, mapping);

        let response = self
            .authorize(self.http_client.post(&url))
            .json(mapping)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::CONFLICT {
            let body = response.text().await?;
            return match serde_json::from_str::<ConflictBody>(&body)
                .ok()
                .and_then(ConflictBody::into_pair)
            {
                Some((existing, duplicate)) => {
                    Err(ConnectorError::mapping_conflict(existing, duplicate))
                }
                None => Err(ConnectorError::Rejected {
                    status: status.as_u16(),
                    detail: body,
                }),
            };
        }

        Err(self.error_from_response(response).await)
    }

    async fn update_child_mappings(
        &self,
        family: &str,
        batch: &ChildMappingBatch,
    ) -> ConnectorResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let url = format!("{}/mapping/{}", self.base_url, family);
        debug!("Mapping PUT {} ({} changes)", url, batch.len());

        let response = self
            .authorize(self.http_client.put(&url))
            .json(batch)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.error_from_response(response).await)
        }
    }
}
