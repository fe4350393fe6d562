//! Invocation handler for the function variant.

use std::sync::Arc;

use anyhow::{Context, Result};
use http::Method;
use iamgate_auth::credential_source;
use iamgate_core::{CredentialOrigin, ProxyConfig};
use iamgate_proxy::{HttpForwarder, SigningProxy};
use serde_json::Value;
use tracing::{debug, error, info};

/// Runs the configured upstream call once per invocation.
#[derive(Debug, Clone)]
pub struct FunctionHandler {
    proxy: SigningProxy,
    method: Method,
    path: String,
    payload: Value,
}

impl FunctionHandler {
    /// Create a handler making the upstream call described by `config`.
    #[must_use]
    pub fn new(proxy: SigningProxy, config: &ProxyConfig) -> Self {
        Self {
            proxy,
            method: config.upstream_method.clone(),
            path: config.upstream_path.clone(),
            payload: config.upstream_payload.clone(),
        }
    }

    /// Build the handler and its pipeline from `config`.
    ///
    /// Credentials come from the environment unless `CREDENTIAL_SOURCE` says
    /// otherwise.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let origin = config.credential_origin_or(CredentialOrigin::Environment);
        let credentials =
            credential_source(origin, config).context("failed to build credential source")?;
        let forwarder = HttpForwarder::new().context("failed to build upstream HTTP client")?;

        debug!(credential_origin = %origin, "configured signing pipeline");
        let proxy = SigningProxy::new(config, credentials, Arc::new(forwarder));
        Ok(Self::new(proxy, config))
    }

    /// Handle one invocation.
    ///
    /// The event is logged but does not influence the upstream call. A
    /// failure is returned as an error carrying the failure's message.
    pub async fn invoke(&self, event: &Value) -> Result<Value> {
        debug!(event = %event, "received invocation");

        let result = match self
            .proxy
            .prepare(self.method.clone(), &self.path, &self.payload)
            .await
        {
            Ok(signed) => {
                info!(
                    method = %signed.method,
                    url = %signed.url,
                    signed_headers = %signed.signed_headers,
                    "signed upstream request"
                );
                self.proxy.dispatch(signed).await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(data) => {
                info!(data = %data, "upstream call succeeded");
                Ok(data)
            }
            Err(err) => {
                error!(kind = err.kind(), error = %err, "upstream call failed");
                Err(anyhow::Error::msg(err.to_string()))
            }
        }
    }
}
