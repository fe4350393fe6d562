//! Credential discovery through the EC2 instance metadata service.
//!
//! Resolution is two sequential requests:
//!
//! 1. `GET /latest/meta-data/iam/security-credentials/` returns the name of
//!    the attached role as plain text.
//! 2. `GET /latest/meta-data/iam/security-credentials/<role>` returns a JSON
//!    document with the temporary credentials of that role.
//!
//! When a token TTL is configured, an IMDSv2 session token is requested first
//! with `PUT /latest/api/token` and sent along with both requests. There is no
//! retry; any failure surfaces as a [`CredentialError`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iamgate_core::{Credentials, ProxyConfig};
use serde::Deserialize;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::credentials::CredentialSource;
use crate::error::CredentialError;

/// Path listing the roles attached to the instance.
const SECURITY_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

/// Path issuing IMDSv2 session tokens.
const TOKEN_PATH: &str = "/latest/api/token";

/// Request header carrying the desired IMDSv2 token lifetime.
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";

/// Request header carrying the IMDSv2 token.
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";

/// Credentials document served for a role.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleCredentials {
    #[serde(default)]
    code: Option<String>,
    access_key_id: String,
    secret_access_key: String,
    token: String,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

/// Resolves the credentials of the role attached to the current instance.
#[derive(Debug, Clone)]
pub struct MetadataCredentialSource {
    client: reqwest::Client,
    endpoint: String,
    token_ttl: Option<u32>,
    clock: Arc<dyn Clock>,
}

impl MetadataCredentialSource {
    /// Create a source talking to the metadata service at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(CredentialError::Client)?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Create a source using an existing HTTP client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            token_ttl: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a source from the metadata fields of `config`.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, CredentialError> {
        Ok(Self::new(&config.metadata_endpoint)?.with_token_ttl(config.metadata_token_ttl))
    }

    /// Use IMDSv2 session tokens with the given lifetime in seconds.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Option<u32>) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Replace the clock used to check credential expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetch the name of the attached role.
    pub async fn role_name(&self, token: Option<&str>) -> Result<String, CredentialError> {
        let url = format!("{}{SECURITY_CREDENTIALS_PATH}", self.endpoint);
        let body = self.get_text(&url, token).await?;

        // The listing holds one role per line; instances carry at most one.
        body.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .ok_or(CredentialError::NoRoleAttached)
    }

    /// Fetch the temporary credentials of `role`.
    pub async fn role_credentials(
        &self,
        role: &str,
        token: Option<&str>,
    ) -> Result<Credentials, CredentialError> {
        let url = format!("{}{SECURITY_CREDENTIALS_PATH}{role}", self.endpoint);
        let body = self.get_text(&url, token).await?;

        let document: RoleCredentials = serde_json::from_str(&body)
            .map_err(|e| CredentialError::MalformedCredentials(e.to_string()))?;

        if let Some(code) = document.code.as_deref() {
            if code != "Success" {
                return Err(CredentialError::MalformedCredentials(format!(
                    "metadata service reported {code}"
                )));
            }
        }
        if document.access_key_id.is_empty() || document.secret_access_key.is_empty() {
            return Err(CredentialError::MalformedCredentials(
                "empty access key or secret key".to_owned(),
            ));
        }

        if document.token.is_empty() {
            return Err(CredentialError::MalformedCredentials(
                "empty session token".to_owned(),
            ));
        }

        let mut credentials = Credentials::new(
            document.access_key_id,
            document.secret_access_key,
            Some(document.token),
        );
        if let Some(expiration) = document.expiration {
            credentials = credentials.with_expiry(expiration);
            if credentials.is_expired_at(self.clock.now()) {
                return Err(CredentialError::Expired(expiration));
            }
        }

        Ok(credentials)
    }

    /// Request an IMDSv2 session token when a TTL is configured.
    async fn session_token(&self) -> Result<Option<String>, CredentialError> {
        let Some(ttl) = self.token_ttl else {
            return Ok(None);
        };

        let url = format!("{}{TOKEN_PATH}", self.endpoint);
        let response = self
            .client
            .put(&url)
            .header(TOKEN_TTL_HEADER, ttl.to_string())
            .send()
            .await
            .map_err(|source| CredentialError::MetadataUnreachable {
                url: url.clone(),
                source,
            })?;

        let token = read_success_body(&url, response).await?;
        Ok(Some(token.trim().to_owned()))
    }

    async fn get_text(&self, url: &str, token: Option<&str>) -> Result<String, CredentialError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response =
            request
                .send()
                .await
                .map_err(|source| CredentialError::MetadataUnreachable {
                    url: url.to_owned(),
                    source,
                })?;

        read_success_body(url, response).await
    }
}

#[async_trait]
impl CredentialSource for MetadataCredentialSource {
    async fn resolve(&self) -> Result<Credentials, CredentialError> {
        let token = self.session_token().await?;
        let role = self.role_name(token.as_deref()).await?;
        debug!(role = %role, "discovered attached role");

        let credentials = self.role_credentials(&role, token.as_deref()).await?;
        info!(
            role = %role,
            access_key_id = %credentials.access_key_id,
            expires_at = ?credentials.expires_at,
            "resolved credentials from instance metadata"
        );
        Ok(credentials)
    }
}

async fn read_success_body(
    url: &str,
    response: reqwest::Response,
) -> Result<String, CredentialError> {
    let status = response.status();
    if !status.is_success() {
        return Err(CredentialError::MetadataStatus {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|source| CredentialError::MetadataUnreachable {
            url: url.to_owned(),
            source,
        })
}
