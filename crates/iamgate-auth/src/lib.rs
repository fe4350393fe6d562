//! AWS Signature Version 4 request signing for iamgate.
//!
//! This crate turns an unsigned upstream request and a set of temporary
//! credentials into a request the upstream API Gateway will accept, and
//! provides the two ways of obtaining those credentials.
//!
//! # Overview
//!
//! AWS Signature Version 4 is the standard authentication mechanism for AWS API
//! requests. This crate implements the signing side for header-based
//! authentication: a canonical form of the request is hashed, a signing key is
//! derived from the secret key and the credential scope, and the resulting
//! signature is attached in the `Authorization` header.
//!
//! # Usage
//!
//! ```rust
//! use iamgate_auth::credentials::{CredentialSource, StaticCredentialSource};
//! use iamgate_auth::scope::SigningScope;
//! use iamgate_auth::sigv4::SigV4Signer;
//!
//! let source = StaticCredentialSource::new(
//!     Some("AKIDEXAMPLE".to_owned()),
//!     Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_owned()),
//!     Some("session-token".to_owned()),
//! );
//! let signer = SigV4Signer::new(SigningScope::resolve(
//!     "example.execute-api.ap-northeast-1.amazonaws.com",
//!     None,
//!     None,
//! ));
//! // Resolve credentials with `source.resolve().await`, then call `signer.sign`.
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request construction per the SigV4 specification
//! - [`clock`] - Time source for signature timestamps
//! - [`credentials`] - Credential source trait and the configuration-backed source
//! - [`error`] - Credential and signing error types
//! - [`metadata`] - Instance metadata credential discovery
//! - [`scope`] - Region/service credential scope
//! - [`sigv4`] - SigV4 signing

pub mod canonical;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod metadata;
pub mod scope;
pub mod sigv4;

pub use clock::{Clock, FixedClock, SystemClock};
pub use credentials::{CredentialSource, StaticCredentialSource, credential_source};
pub use error::{CredentialError, SigningError};
pub use metadata::MetadataCredentialSource;
pub use scope::SigningScope;
pub use sigv4::{SigV4Signer, hash_payload};
