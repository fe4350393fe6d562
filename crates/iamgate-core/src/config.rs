//! Configuration management for iamgate.
//!
//! All configuration is driven by environment variables and read exactly once
//! at process start. The resulting [`ProxyConfig`] is passed by reference to
//! the credential sources and the request composer; nothing else reads the
//! environment.

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Where temporary credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// Discover the attached role through the instance metadata service.
    Metadata,
    /// Read `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
    Environment,
}

impl FromStr for CredentialOrigin {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metadata" | "imds" => Ok(Self::Metadata),
            "environment" | "env" | "static" => Ok(Self::Environment),
            other => Err(CoreError::InvalidVariable {
                name: "CREDENTIAL_SOURCE",
                reason: format!("unknown credential source `{other}`"),
            }),
        }
    }
}

impl fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => f.write_str("metadata"),
            Self::Environment => f.write_str("environment"),
        }
    }
}

/// Process-wide configuration for iamgate.
#[derive(Clone)]
pub struct ProxyConfig {
    /// Host the server variant binds to.
    pub listen_host: String,
    /// Port the server variant listens on.
    pub port: u16,
    /// Host of the private API Gateway endpoint.
    pub api_gateway_host: String,
    /// Stage segment prepended to every upstream path.
    pub api_gateway_stage: String,
    /// Signing region override. Derived from the host when unset.
    pub signing_region: Option<String>,
    /// Signing service override. Derived from the host when unset.
    pub signing_service: Option<String>,
    /// Method of the forwarded upstream call.
    pub upstream_method: http::Method,
    /// Path of the forwarded upstream call, relative to the stage.
    pub upstream_path: String,
    /// JSON payload sent with the forwarded upstream call.
    pub upstream_payload: serde_json::Value,
    /// Explicit credential origin. Each deployment shape picks its own default.
    pub credential_origin: Option<CredentialOrigin>,
    /// Base URL of the instance metadata service.
    pub metadata_endpoint: String,
    /// TTL in seconds for an IMDSv2 session token. IMDSv1 is used when unset.
    pub metadata_token_ttl: Option<u32>,
    /// Static access key id.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
    /// Static session token.
    pub session_token: Option<String>,
    /// Log level filter.
    pub log_level: String,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("listen_host", &self.listen_host)
            .field("port", &self.port)
            .field("api_gateway_host", &self.api_gateway_host)
            .field("api_gateway_stage", &self.api_gateway_stage)
            .field("signing_region", &self.signing_region)
            .field("signing_service", &self.signing_service)
            .field("upstream_method", &self.upstream_method)
            .field("upstream_path", &self.upstream_path)
            .field("upstream_payload", &self.upstream_payload)
            .field("credential_origin", &self.credential_origin)
            .field("metadata_endpoint", &self.metadata_endpoint)
            .field("metadata_token_ttl", &self.metadata_token_ttl)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "..."),
            )
            .field("session_token", &self.session_token.as_ref().map(|_| "..."))
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_owned(),
            port: 8000,
            api_gateway_host: "xxxxxxxx.execute-api.ap-northeast-1.amazonaws.com".to_owned(),
            api_gateway_stage: "Dev".to_owned(),
            signing_region: None,
            signing_service: None,
            upstream_method: http::Method::GET,
            upstream_path: "/".to_owned(),
            upstream_payload: serde_json::json!({ "a": "aaaaa" }),
            credential_origin: None,
            metadata_endpoint: "http://169.254.169.254".to_owned(),
            metadata_token_ttl: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            log_level: "info".to_owned(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults. Values that cannot be parsed are
    /// reported instead of silently ignored.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("LISTEN_HOST") {
            config.listen_host = v;
        }
        if let Some(v) = lookup("PORT") {
            config.port = v.trim().parse().map_err(|e| CoreError::InvalidVariable {
                name: "PORT",
                reason: format!("{e}"),
            })?;
        }
        if let Some(v) = lookup("API_GATEWAY_HOST") {
            if v.trim().is_empty() {
                return Err(CoreError::Config(
                    "API_GATEWAY_HOST must not be empty".to_owned(),
                ));
            }
            config.api_gateway_host = v;
        }
        if let Some(v) = lookup("API_GATEWAY_STAGE") {
            config.api_gateway_stage = v;
        }
        config.signing_region = non_empty(lookup("API_GATEWAY_REGION"));
        config.signing_service = non_empty(lookup("API_GATEWAY_SERVICE"));
        if let Some(v) = lookup("UPSTREAM_METHOD") {
            config.upstream_method =
                http::Method::from_bytes(v.trim().as_bytes()).map_err(|e| {
                    CoreError::InvalidVariable {
                        name: "UPSTREAM_METHOD",
                        reason: format!("{e}"),
                    }
                })?;
        }
        if let Some(v) = lookup("UPSTREAM_PATH") {
            config.upstream_path = v;
        }
        if let Some(v) = lookup("UPSTREAM_PAYLOAD") {
            config.upstream_payload =
                serde_json::from_str(&v).map_err(|e| CoreError::InvalidVariable {
                    name: "UPSTREAM_PAYLOAD",
                    reason: format!("{e}"),
                })?;
        }
        if let Some(v) = non_empty(lookup("CREDENTIAL_SOURCE")) {
            config.credential_origin = Some(v.parse()?);
        }
        if let Some(v) = lookup("METADATA_ENDPOINT") {
            config.metadata_endpoint = v.trim_end_matches('/').to_owned();
        }
        if let Some(v) = non_empty(lookup("METADATA_TOKEN_TTL")) {
            config.metadata_token_ttl =
                Some(v.trim().parse().map_err(|e| CoreError::InvalidVariable {
                    name: "METADATA_TOKEN_TTL",
                    reason: format!("{e}"),
                })?);
        }
        config.access_key_id = lookup("AWS_ACCESS_KEY_ID");
        config.secret_access_key = lookup("AWS_SECRET_ACCESS_KEY");
        config.session_token = lookup("AWS_SESSION_TOKEN");
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        Ok(config)
    }

    /// Resolve the credential origin, falling back to the deployment default.
    #[must_use]
    pub fn credential_origin_or(&self, default: CredentialOrigin) -> CredentialOrigin {
        self.credential_origin.unwrap_or(default)
    }

    /// Address the server variant binds to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
