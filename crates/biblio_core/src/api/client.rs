use crate::api::errors::ApiError;
use crate::api::request::{ApiRequest, Transport};
use crate::config::ClientConfig;
use async_trait::async_trait;
use core::time::Duration;
use log::debug;
use reqwest::{ClientBuilder, Url, header};
use serde_json::Value;

/// HTTP transport to the library REST API
pub struct ApiClient {
    /// A HTTP client reused for every call so connections are pooled
    http_client: reqwest::Client,
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:8080/api/v1/rest`
    base_url: String,
}

impl ApiClient {
    /// Create a new HTTP client, to be shared by all stores
    /// # Errors
    /// Fails if the base URL is unusable or any of the reqwest `ClientBuilder` methods fail
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per program run"
    )]
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Url::parse(&config.base_url).map_err(|err| ApiError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: err.to_string(),
        })?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let client = ClientBuilder::new()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build();

        client
            .map(|http_client| Self {
                http_client,
                base_url: config.base_url.trim_end_matches('/').to_owned(),
            })
            .map_err(ApiError::Client)
    }

    #[must_use]
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ApiClient {
    #[allow(clippy::missing_inline_in_public_items, reason = "Called through dyn")]
    async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.url_for(&request.path);
        debug!("{} {url}", request.method);

        let mut builder = self.http_client.request(request.method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ApiError::Request { url, source })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                path: request.path,
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            path: request.path,
            source,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::api::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn joins_paths_below_base_url() {
        let config = ClientConfig::default();
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(
            client.url_for("books/42/copies"),
            "http://127.0.0.1:8080/api/v1/rest/books/42/copies"
        );
        assert_eq!(
            client.url_for("/categories"),
            "http://127.0.0.1:8080/api/v1/rest/categories"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        let config = ClientConfig {
            base_url: "api/v1/rest".to_owned(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            ApiClient::new(&config),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_failure() {
        // Nothing listens on the discard port of the loopback interface
        let config = ClientConfig {
            base_url: "http://127.0.0.1:9/api/v1/rest".to_owned(),
            connect_timeout: Duration::from_secs(2),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();

        let error = client
            .execute(ApiRequest::get("books"))
            .await
            .unwrap_err();
        assert!(matches!(error, ApiError::Request { .. }));
        assert_eq!(error.kind(), ErrorKind::NetworkFailure);
    }
}
