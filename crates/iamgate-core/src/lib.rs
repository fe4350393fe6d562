//! Core types and configuration for iamgate.
//!
//! This crate provides the building blocks shared by the signing pipeline and
//! both deployment shapes: the process-wide [`ProxyConfig`] loaded once from
//! the environment, the [`Credentials`] triple, and the request descriptors
//! that flow from composition through signing to forwarding.

mod config;
mod error;
mod types;

pub use config::{CredentialOrigin, ProxyConfig};
pub use error::{CoreError, CoreResult};
pub use types::{Credentials, SignedRequest, UnsignedRequest};
