use crate::api::errors::ApiError;
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A single call against the REST API, relative to the configured base URL.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the base URL without a leading slash, e.g. `books/42/copies`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: String, body: Option<Value>) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body,
        }
    }

    #[must_use]
    #[inline]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path.into(), None)
    }

    /// # Errors
    /// Fails if the body cannot be serialized to JSON
    #[inline]
    pub fn post<B: Serialize + ?Sized>(
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self, ApiError> {
        Ok(Self::new(
            Method::POST,
            path.into(),
            Some(serde_json::to_value(body)?),
        ))
    }

    /// # Errors
    /// Fails if the body cannot be serialized to JSON
    #[inline]
    pub fn put<B: Serialize + ?Sized>(
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self, ApiError> {
        Ok(Self::new(
            Method::PUT,
            path.into(),
            Some(serde_json::to_value(body)?),
        ))
    }

    #[must_use]
    #[inline]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path.into(), None)
    }

    #[must_use]
    #[inline]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }
}

/// The seam between the stores and the remote API.
///
/// Implementations return the decoded JSON body of a 2xx response (`Value::Null` for an empty
/// body) and map everything else to an [`ApiError`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// Executes a request and decodes its body into `T`
pub(crate) async fn fetch<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: ApiRequest,
) -> Result<T, ApiError> {
    let path = request.path.clone();
    let value = transport.execute(request).await?;
    serde_json::from_value(value).map_err(|source| ApiError::Decode { path, source })
}
