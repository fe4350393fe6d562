//! Signing pipeline and upstream forwarding for iamgate.
//!
//! [`SigningProxy`] ties the pieces together: a [`CredentialSource`] supplies
//! temporary credentials, the [`RequestComposer`] builds the stage-prefixed
//! request with its JSON body, the [`SigV4Signer`] attaches the signature, and
//! a [`Forward`] implementation dispatches it upstream.
//!
//! [`CredentialSource`]: iamgate_auth::CredentialSource
//! [`SigV4Signer`]: iamgate_auth::SigV4Signer

pub mod compose;
pub mod error;
pub mod forward;
pub mod pipeline;

pub use compose::RequestComposer;
pub use error::{ProxyError, UpstreamError};
pub use forward::{Forward, HttpForwarder};
pub use pipeline::SigningProxy;
