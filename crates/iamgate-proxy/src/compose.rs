//! Composition of unsigned upstream requests.

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use iamgate_core::{ProxyConfig, UnsignedRequest};
use serde::Serialize;

use crate::error::ProxyError;

/// Content type of every upstream request body.
const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds stage-prefixed requests against the API Gateway host.
#[derive(Debug, Clone)]
pub struct RequestComposer {
    host: String,
    stage: String,
}

impl RequestComposer {
    /// Create a composer for `host` and `stage`.
    pub fn new(host: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            stage: stage.into(),
        }
    }

    /// Create a composer from the gateway fields of `config`.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(&config.api_gateway_host, &config.api_gateway_stage)
    }

    /// The upstream host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build an unsigned request.
    ///
    /// The path becomes `/<stage><path>` with no other change, and the payload
    /// is serialized exactly once; the resulting string is the body that gets
    /// signed and sent.
    ///
    /// # Examples
    ///
    /// ```
    /// use iamgate_proxy::RequestComposer;
    ///
    /// let composer = RequestComposer::new("example.execute-api.ap-northeast-1.amazonaws.com", "Dev");
    /// let request = composer
    ///     .build(http::Method::GET, "/", &serde_json::json!({ "a": "aaaaa" }))
    ///     .unwrap();
    /// assert_eq!(request.path, "/Dev/");
    /// assert_eq!(request.body, r#"{"a":"aaaaa"}"#);
    /// ```
    pub fn build<T>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<UnsignedRequest, ProxyError>
    where
        T: Serialize + ?Sized,
    {
        let path = format!("/{}{path}", self.stage);
        let body = serde_json::to_string(payload)?;
        let url = format!("https://{}{path}", self.host);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        Ok(UnsignedRequest {
            host: self.host.clone(),
            method,
            path,
            url,
            body,
            headers,
        })
    }
}
