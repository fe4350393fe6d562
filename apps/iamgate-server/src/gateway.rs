//! Gateway service routing incoming requests.
//!
//! `GET /` runs the configured upstream call through the [`SigningProxy`] and
//! returns the upstream JSON. A failure of any stage is reported as
//! `{"message": ...}` with status 200 so callers always receive a JSON body.
//!
//! Health-check endpoints (`/health`, `/_health`) are answered locally; every
//! other route is a 404.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{Method, StatusCode};
use hyper::body::Incoming;
use hyper::service::Service;
use iamgate_core::ProxyConfig;
use iamgate_proxy::{ProxyError, SigningProxy};
use serde_json::{Value, json};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::service::{GatewayBody, json_response, with_request_id};

/// Server version reported in health check responses.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The upstream call made for every `GET /`.
#[derive(Debug)]
pub struct UpstreamCall {
    /// Method of the upstream request.
    pub method: Method,
    /// Path after the stage segment.
    pub path: String,
    /// JSON payload sent as the body.
    pub payload: Value,
}

impl UpstreamCall {
    /// Take the upstream call from `config`.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            method: config.upstream_method.clone(),
            path: config.upstream_path.clone(),
            payload: config.upstream_payload.clone(),
        }
    }
}

/// Hyper service answering the server routes.
#[derive(Debug, Clone)]
pub struct GatewayService {
    proxy: SigningProxy,
    call: Arc<UpstreamCall>,
}

impl GatewayService {
    /// Create a gateway forwarding `call` through `proxy`.
    #[must_use]
    pub fn new(proxy: SigningProxy, call: UpstreamCall) -> Self {
        Self {
            proxy,
            call: Arc::new(call),
        }
    }

    /// Route a request by method and path.
    pub async fn handle(&self, method: &Method, path: &str) -> http::Response<GatewayBody> {
        let request_id = Uuid::new_v4().to_string();

        let response = if *method == Method::GET && path == "/" {
            self.forward(&request_id).await
        } else if is_health_check(method, path) {
            health_check_response()
        } else {
            debug!(request_id = %request_id, %method, path, "no route matched");
            json_response(StatusCode::NOT_FOUND, &json!({ "message": "Not Found" }))
        };

        with_request_id(response, &request_id)
    }

    async fn forward(&self, request_id: &str) -> http::Response<GatewayBody> {
        info!(
            request_id,
            method = %self.call.method,
            path = %self.call.path,
            "forwarding upstream call"
        );
        let result = self
            .proxy
            .forward(self.call.method.clone(), &self.call.path, &self.call.payload)
            .await;
        forward_response(request_id, result)
    }
}

impl Service<http::Request<Incoming>> for GatewayService {
    type Response = http::Response<GatewayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let gateway = self.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        Box::pin(async move { Ok(gateway.handle(&method, &path).await) })
    }
}

/// Turn the outcome of a forward into the response sent to the caller.
pub fn forward_response(
    request_id: &str,
    result: Result<Value, ProxyError>,
) -> http::Response<GatewayBody> {
    match result {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(err) => {
            error!(request_id, kind = err.kind(), error = %err, "upstream call failed");
            json_response(StatusCode::OK, &json!({ "message": err.to_string() }))
        }
    }
}

fn is_health_check(method: &Method, path: &str) -> bool {
    *method == Method::GET && (path == "/health" || path == "/_health")
}

fn health_check_response() -> http::Response<GatewayBody> {
    json_response(
        StatusCode::OK,
        &json!({ "status": "running", "version": VERSION }),
    )
}
