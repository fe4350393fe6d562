//! Descriptor types that flow through the signing pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use http::{HeaderMap, Method};

/// A set of temporary AWS credentials.
///
/// Credentials live for a single forward operation and are never persisted.
/// The secret key and session token are redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token accompanying temporary credentials.
    pub session_token: Option<String>,
    /// When the credentials stop being valid, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Create credentials without an expiry.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
            expires_at: None,
        }
    }

    /// Attach an expiry time.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the credentials have expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"...")
            .field("session_token", &self.session_token.as_ref().map(|_| "..."))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// An upstream request before signing.
///
/// `path` always starts with `/<stage>`, and `body` is the exact string that
/// will be both signed and transmitted.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedRequest {
    /// Upstream host (no scheme, no port).
    pub host: String,
    /// HTTP method, passed through verbatim.
    pub method: Method,
    /// Stage-prefixed path, optionally with a query string.
    pub path: String,
    /// Full URL the request is dispatched to.
    pub url: String,
    /// Serialized JSON body.
    pub body: String,
    /// Base headers.
    pub headers: HeaderMap,
}

/// An upstream request carrying SigV4 authentication headers.
///
/// Any change to `method`, `path`, `body` or `headers` after signing
/// invalidates the signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    /// Upstream host the signature was computed for.
    pub host: String,
    /// HTTP method.
    pub method: Method,
    /// Stage-prefixed path.
    pub path: String,
    /// Full URL the request is dispatched to.
    pub url: String,
    /// Serialized JSON body, byte-identical to the signed payload.
    pub body: String,
    /// Headers to send. Never contains `host`.
    pub headers: HeaderMap,
    /// Semicolon-separated list of headers covered by the signature.
    pub signed_headers: String,
    /// Hex-encoded signature.
    pub signature: String,
}
