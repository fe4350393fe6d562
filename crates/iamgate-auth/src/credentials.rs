//! Credential source trait and implementations.
//!
//! This module defines the [`CredentialSource`] trait for resolving temporary
//! credentials, the [`StaticCredentialSource`] that reads them from process
//! configuration, and [`credential_source`], which picks the origin once at
//! startup.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use iamgate_core::{CredentialOrigin, Credentials, ProxyConfig};
use tracing::debug;

use crate::error::CredentialError;
use crate::metadata::MetadataCredentialSource;

/// Something that can produce a complete set of temporary credentials.
///
/// Implementations never return partial credentials: either all required
/// components are present, or the call fails.
#[async_trait]
pub trait CredentialSource: Send + Sync + fmt::Debug {
    /// Resolve credentials for one forward operation.
    async fn resolve(&self) -> Result<Credentials, CredentialError>;
}

/// Credentials taken from already-loaded process configuration.
///
/// All three of `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and
/// `AWS_SESSION_TOKEN` are required.
///
/// # Examples
///
/// ```
/// use iamgate_auth::credentials::StaticCredentialSource;
///
/// let source = StaticCredentialSource::new(
///     Some("AKID".to_owned()),
///     Some("secret".to_owned()),
///     None,
/// );
/// let err = source.load().unwrap_err();
/// assert!(err.to_string().contains("AWS_SESSION_TOKEN"));
/// ```
#[derive(Clone)]
pub struct StaticCredentialSource {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
}

impl StaticCredentialSource {
    /// Create a source from raw values.
    #[must_use]
    pub fn new(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id,
            secret_access_key,
            session_token,
        }
    }

    /// Create a source from the static credential fields of `config`.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            config.session_token.clone(),
        )
    }

    /// Synchronously build the credentials.
    pub fn load(&self) -> Result<Credentials, CredentialError> {
        let access_key_id = required(self.access_key_id.as_ref(), "AWS_ACCESS_KEY_ID")?;
        let secret_access_key = required(self.secret_access_key.as_ref(), "AWS_SECRET_ACCESS_KEY")?;
        let session_token = required(self.session_token.as_ref(), "AWS_SESSION_TOKEN")?;

        Ok(Credentials::new(
            access_key_id,
            secret_access_key,
            Some(session_token),
        ))
    }
}

impl fmt::Debug for StaticCredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialSource")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "..."),
            )
            .field("session_token", &self.session_token.as_ref().map(|_| "..."))
            .finish()
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn resolve(&self) -> Result<Credentials, CredentialError> {
        let credentials = self.load()?;
        debug!(
            access_key_id = %credentials.access_key_id,
            "resolved credentials from environment"
        );
        Ok(credentials)
    }
}

/// Build the credential source for `origin`.
pub fn credential_source(
    origin: CredentialOrigin,
    config: &ProxyConfig,
) -> Result<Arc<dyn CredentialSource>, CredentialError> {
    match origin {
        CredentialOrigin::Environment => Ok(Arc::new(StaticCredentialSource::from_config(config))),
        CredentialOrigin::Metadata => Ok(Arc::new(MetadataCredentialSource::from_config(config)?)),
    }
}

fn required(value: Option<&String>, name: &'static str) -> Result<String, CredentialError> {
    value
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or(CredentialError::MissingVariable(name))
}
