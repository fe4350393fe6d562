//! Error types for the signing pipeline.

use iamgate_auth::{CredentialError, SigningError};

/// Failures reported by the upstream call.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-2xx status.
    #[error("Request failed with status code {}", .status.as_u16())]
    Status {
        /// Response status.
        status: http::StatusCode,
        /// Response body, kept for logging.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Any failure of a forward operation.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Credentials could not be resolved.
    #[error("credentials unavailable: {0}")]
    CredentialUnavailable(#[from] CredentialError),

    /// The payload could not be encoded as JSON.
    #[error("failed to serialize payload: {0}")]
    PayloadSerialization(#[from] serde_json::Error),

    /// The request could not be signed.
    #[error("failed to sign request: {0}")]
    Signing(#[from] SigningError),

    /// The upstream call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    /// Short machine-readable name of the failure class, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CredentialUnavailable(_) => "credential_unavailable",
            Self::PayloadSerialization(_) => "payload_serialization",
            Self::Signing(_) => "signing",
            Self::Upstream(_) => "upstream",
        }
    }
}
