//! Dispatch of signed requests to the upstream.

use std::fmt;

use async_trait::async_trait;
use iamgate_core::SignedRequest;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::UpstreamError;

/// Sends a signed request upstream and returns the response body.
///
/// Implementations must transmit the request exactly as signed; no retries.
#[async_trait]
pub trait Forward: Send + Sync + fmt::Debug {
    /// Send `request`, returning the JSON body of a 2xx response.
    async fn send(&self, request: SignedRequest) -> Result<Value, UpstreamError>;
}

/// [`Forward`] implementation backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    /// Create a forwarder with transport-default settings.
    pub fn new() -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client))
    }

    /// Create a forwarder using an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn send(&self, request: SignedRequest) -> Result<Value, UpstreamError> {
        let SignedRequest {
            method,
            url,
            body,
            headers,
            ..
        } = request;

        debug!(method = %method, url = %url, "forwarding signed request");

        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(url = %url, status = %status, body = %text, "upstream rejected request");
            return Err(UpstreamError::Status { status, body: text });
        }

        Ok(parse_body(text))
    }
}

/// Interpret a successful response body.
///
/// JSON is returned as-is, an empty body as `null`, and anything else as a
/// JSON string.
fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => Value::String(text),
    }
}
