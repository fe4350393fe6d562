//! Error types for credential resolution and request signing.

use chrono::{DateTime, Utc};

/// Errors raised while resolving temporary credentials.
///
/// Every variant means the credential origin could not supply a complete,
/// usable set of credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// A required environment variable is unset or empty.
    #[error("missing environment variable {0}")]
    MissingVariable(&'static str),

    /// The HTTP client for the metadata service could not be built.
    #[error("failed to build metadata client: {0}")]
    Client(#[source] reqwest::Error),

    /// The metadata service could not be reached or the response was cut short.
    #[error("metadata request to {url} failed: {source}")]
    MetadataUnreachable {
        /// URL that was requested.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The metadata service answered with a non-success status.
    #[error("metadata request to {url} returned status {status}")]
    MetadataStatus {
        /// URL that was requested.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// No IAM role is attached to the instance.
    #[error("no IAM role is attached to this instance")]
    NoRoleAttached,

    /// The credentials document could not be understood.
    #[error("malformed metadata credentials: {0}")]
    MalformedCredentials(String),

    /// The resolved credentials are already past their expiry.
    #[error("credentials expired at {0}")]
    Expired(DateTime<Utc>),
}

/// Errors raised while signing a request.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// A credential component required for signing is empty.
    #[error("incomplete credentials: missing {0}")]
    IncompleteCredentials(&'static str),

    /// A header value could not be represented as an HTTP header.
    #[error("invalid value for header {0}")]
    InvalidHeaderValue(String),
}
