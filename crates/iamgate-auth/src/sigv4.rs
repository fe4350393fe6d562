//! AWS Signature Version 4 request signing.
//!
//! This module implements the header-based SigV4 signing flow:
//!
//! 1. Stamp the request with `x-amz-date` (and `x-amz-security-token` for
//!    temporary credentials), adding `host` and `content-length` when missing.
//! 2. Build the canonical request from the method, path, query, signable
//!    headers and the SHA-256 of the body.
//! 3. Build the string to sign from the timestamp, credential scope, and canonical request hash.
//! 4. Derive the signing key using HMAC-SHA256 from the secret key and credential scope components.
//! 5. Compute the signature, attach the `Authorization` header and drop `host`,
//!    which the transport sets on its own.
//!
//! The main entry point is [`SigV4Signer::sign`].

use std::sync::Arc;

use hmac::{Hmac, KeyInit, Mac};
use http::header::{AUTHORIZATION, CONTENT_LENGTH, HOST};
use http::{HeaderMap, HeaderName, HeaderValue};
use iamgate_core::{Credentials, SignedRequest, UnsignedRequest};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::canonical::{
    PathEncoding, build_canonical_request, build_signed_headers_string, is_signable_header,
    split_path_and_query,
};
use crate::clock::{Clock, SystemClock};
use crate::error::SigningError;
use crate::scope::SigningScope;

/// The only algorithm supported by this implementation.
const SUPPORTED_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// `x-amz-date` timestamp format.
const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Credential scope date format.
const SCOPE_DATE_FORMAT: &str = "%Y%m%d";

/// Header carrying the signing timestamp.
pub const X_AMZ_DATE: HeaderName = HeaderName::from_static("x-amz-date");

/// Header carrying the session token of temporary credentials.
pub const X_AMZ_SECURITY_TOKEN: HeaderName = HeaderName::from_static("x-amz-security-token");

type HmacSha256 = Hmac<Sha256>;

/// Signs upstream requests for one region/service scope.
///
/// The signer holds no per-request state: given the same request, credentials
/// and clock reading it always produces the same output.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    scope: SigningScope,
    clock: Arc<dyn Clock>,
}

impl SigV4Signer {
    /// Create a signer for `scope` that reads the system clock.
    #[must_use]
    pub fn new(scope: SigningScope) -> Self {
        Self {
            scope,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to timestamp signatures.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The scope signatures are issued for.
    #[must_use]
    pub fn scope(&self) -> &SigningScope {
        &self.scope
    }

    /// Sign `request` with `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::IncompleteCredentials`] if the access key id or
    /// secret key is empty, or [`SigningError::InvalidHeaderValue`] if a
    /// header cannot be carried over HTTP.
    pub fn sign(
        &self,
        request: UnsignedRequest,
        credentials: &Credentials,
    ) -> Result<SignedRequest, SigningError> {
        validate_credentials(credentials)?;

        let now = self.clock.now();
        let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
        let date = now.format(SCOPE_DATE_FORMAT).to_string();

        let UnsignedRequest {
            host,
            method,
            path,
            url,
            body,
            mut headers,
        } = request;

        if !headers.contains_key(HOST) {
            headers.insert(HOST, header_value(HOST.as_str(), &host)?);
        }
        if !body.is_empty() && !headers.contains_key(CONTENT_LENGTH) {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        headers.insert(X_AMZ_DATE, header_value(X_AMZ_DATE.as_str(), &amz_date)?);
        if let Some(token) = credentials.session_token.as_deref() {
            headers.insert(
                X_AMZ_SECURITY_TOKEN,
                header_value(X_AMZ_SECURITY_TOKEN.as_str(), token)?,
            );
        }

        let payload_hash = hash_payload(body.as_bytes());
        let (canonical_request, signed_headers) = {
            let header_pairs = collect_signable_headers(&headers)?;
            let signed_names: Vec<&str> = header_pairs.iter().map(|(name, _)| *name).collect();
            let (uri, query) = split_path_and_query(&path);

            let canonical_request = build_canonical_request(
                method.as_str(),
                uri,
                query,
                &header_pairs,
                &signed_names,
                &payload_hash,
                PathEncoding::for_service(&self.scope.service),
            );
            (canonical_request, build_signed_headers_string(&signed_names))
        };

        debug!(canonical_request, "Built canonical request");

        let canonical_hash = hash_payload(canonical_request.as_bytes());
        let credential_scope = self.scope.credential_scope(&date);
        let string_to_sign = build_string_to_sign(&amz_date, &credential_scope, &canonical_hash);

        debug!(string_to_sign, "Built string to sign");

        let signing_key = derive_signing_key(
            &credentials.secret_access_key,
            &date,
            &self.scope.region,
            &self.scope.service,
        );
        let signature = compute_signature(&signing_key, &string_to_sign);

        let authorization = format!(
            "{SUPPORTED_ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        );
        headers.insert(
            AUTHORIZATION,
            header_value(AUTHORIZATION.as_str(), &authorization)?,
        );

        // The transport derives its own Host header from the URL.
        headers.remove(HOST);

        debug!(
            access_key_id = %credentials.access_key_id,
            region = %self.scope.region,
            service = %self.scope.service,
            signed_headers = %signed_headers,
            "Signed request"
        );

        Ok(SignedRequest {
            host,
            method,
            path,
            url,
            body,
            headers,
            signed_headers,
            signature,
        })
    }
}

/// Build the SigV4 string to sign.
///
/// Format:
/// ```text
/// AWS4-HMAC-SHA256\n
/// <ISO8601 timestamp>\n
/// <credential_scope>\n
/// <hex(SHA256(canonical_request))>
/// ```
///
/// # Examples
///
/// ```
/// use iamgate_auth::sigv4::build_string_to_sign;
///
/// let sts = build_string_to_sign(
///     "20130524T000000Z",
///     "20130524/us-east-1/s3/aws4_request",
///     "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972",
/// );
/// assert!(sts.starts_with("AWS4-HMAC-SHA256\n20130524T000000Z\n"));
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{SUPPORTED_ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the SigV4 signing key using HMAC-SHA256 chain.
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, b"aws4_request")
}

/// Compute the HMAC-SHA256 signature of `data` using the given `signing_key`.
///
/// Returns the hex-encoded signature.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    let sig = hmac_sha256(signing_key, data.as_bytes());
    hex::encode(sig)
}

/// Compute the SHA-256 hash of the given payload and return it as a hex string.
///
/// # Examples
///
/// ```
/// use iamgate_auth::sigv4::hash_payload;
///
/// // SHA-256 of empty payload
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Reject credentials that cannot produce a signature.
fn validate_credentials(credentials: &Credentials) -> Result<(), SigningError> {
    if credentials.access_key_id.is_empty() {
        return Err(SigningError::IncompleteCredentials("access key id"));
    }
    if credentials.secret_access_key.is_empty() {
        return Err(SigningError::IncompleteCredentials("secret access key"));
    }
    Ok(())
}

/// Collect the name-value pairs of every header that takes part in the signature.
fn collect_signable_headers(headers: &HeaderMap) -> Result<Vec<(&str, &str)>, SigningError> {
    let mut result = Vec::with_capacity(headers.len());

    for (name, value) in headers {
        let name = name.as_str();
        if !is_signable_header(name) {
            continue;
        }
        let value = value
            .to_str()
            .map_err(|_| SigningError::InvalidHeaderValue(name.to_owned()))?;
        result.push((name, value));
    }

    Ok(result)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, SigningError> {
    HeaderValue::from_str(value).map_err(|_| SigningError::InvalidHeaderValue(name.to_owned()))
}

/// Compute HMAC-SHA256 and return the raw bytes.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
