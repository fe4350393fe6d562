//! The credential -> compose -> sign -> forward pipeline.

use std::sync::Arc;

use http::Method;
use iamgate_auth::{CredentialSource, SigV4Signer, SigningScope};
use iamgate_core::{ProxyConfig, SignedRequest};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::compose::RequestComposer;
use crate::error::ProxyError;
use crate::forward::Forward;

/// Forwards requests to the private API with freshly signed credentials.
///
/// Every call resolves credentials and signs from scratch; nothing is cached
/// between calls, so one instance can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct SigningProxy {
    composer: RequestComposer,
    credentials: Arc<dyn CredentialSource>,
    signer: SigV4Signer,
    forwarder: Arc<dyn Forward>,
}

impl SigningProxy {
    /// Build the pipeline for the gateway described by `config`.
    #[must_use]
    pub fn new(
        config: &ProxyConfig,
        credentials: Arc<dyn CredentialSource>,
        forwarder: Arc<dyn Forward>,
    ) -> Self {
        let scope = SigningScope::resolve(
            &config.api_gateway_host,
            config.signing_region.as_deref(),
            config.signing_service.as_deref(),
        );

        Self {
            composer: RequestComposer::from_config(config),
            credentials,
            signer: SigV4Signer::new(scope),
            forwarder,
        }
    }

    /// Replace the signer, e.g. to pin its clock.
    #[must_use]
    pub fn with_signer(mut self, signer: SigV4Signer) -> Self {
        self.signer = signer;
        self
    }

    /// The signer in use.
    #[must_use]
    pub fn signer(&self) -> &SigV4Signer {
        &self.signer
    }

    /// Resolve credentials, compose and sign a request without sending it.
    ///
    /// Credential resolution and composition run concurrently. A credential
    /// failure takes precedence over a serialization failure.
    pub async fn prepare<T>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<SignedRequest, ProxyError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let (credentials, request) = tokio::join!(self.credentials.resolve(), async {
            self.composer.build(method, path, payload)
        });
        let credentials = credentials?;
        let request = request?;

        let signed = self.signer.sign(request, &credentials)?;
        debug!(
            method = %signed.method,
            url = %signed.url,
            signed_headers = %signed.signed_headers,
            "prepared signed request"
        );
        Ok(signed)
    }

    /// Sign and forward a request, returning the upstream JSON body.
    pub async fn forward<T>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<Value, ProxyError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let signed = self.prepare(method, path, payload).await?;
        self.dispatch(signed).await
    }

    /// Send an already signed request upstream.
    pub async fn dispatch(&self, signed: SignedRequest) -> Result<Value, ProxyError> {
        let url = signed.url.clone();

        let body = self.forwarder.send(signed).await?;
        info!(url = %url, "upstream request succeeded");
        Ok(body)
    }
}
