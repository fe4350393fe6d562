//! Canonical request construction for AWS Signature Version 4.
//!
//! This module implements the canonical request format as specified by AWS:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Each component is normalized so that the signature computed here matches
//! the one the upstream recomputes from the request it receives.

use std::collections::BTreeMap;

use percent_encoding::{
    AsciiSet, CONTROLS, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode,
};

/// The set of characters that must be percent-encoded in URI path segments.
///
/// Per AWS SigV4 spec, all characters except unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) must be encoded.
/// Forward slashes in the path are preserved (not encoded).
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The characters an HTTP client percent-encodes in a URL path.
///
/// Everything else, including `%`, sub-delimiters, `:` and `@`, goes on the
/// wire unchanged. This mirrors the path set of the `url` crate, which
/// `reqwest` uses to build the request line.
const WIRE_PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Headers that are never part of the signature.
///
/// Proxies and transports are free to add, drop or rewrite these, so signing
/// them would make the signature fragile.
const UNSIGNABLE_HEADERS: &[&str] = &[
    "authorization",
    "connection",
    "expect",
    "presigned-expires",
    "range",
    "user-agent",
    "x-amzn-trace-id",
];

/// How path segments are encoded in the canonical URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEncoding {
    /// Encode each segment once and keep the path as-is. Used by S3.
    Single,
    /// Normalize the path as sent on the wire and encode it once more. Used by
    /// every other service.
    Double,
}

impl PathEncoding {
    /// Pick the encoding AWS expects for the given signing service.
    #[must_use]
    pub fn for_service(service: &str) -> Self {
        if service == "s3" {
            Self::Single
        } else {
            Self::Double
        }
    }
}

/// Build the full canonical request string from its components.
///
/// The result is a newline-separated string of:
/// 1. HTTP method
/// 2. Canonical URI
/// 3. Canonical query string
/// 4. Canonical headers (terminated by an extra newline)
/// 5. Signed headers
/// 6. Hashed payload
///
/// # Examples
///
/// ```
/// use iamgate_auth::canonical::{PathEncoding, build_canonical_request};
///
/// let canonical = build_canonical_request(
///     "GET",
///     "/Dev/",
///     "",
///     &[("host", "example.execute-api.ap-northeast-1.amazonaws.com")],
///     &["host"],
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
///     PathEncoding::Double,
/// );
/// assert!(canonical.starts_with("GET\n/Dev/\n"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
    encoding: PathEncoding,
) -> String {
    let canonical_uri = build_canonical_uri(uri, encoding);
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = build_canonical_headers(headers, signed_headers);
    let signed_headers_str = build_signed_headers_string(signed_headers);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    )
}

/// Build the canonical URI for a request path.
///
/// With [`PathEncoding::Single`] each segment is URI-encoded once and the path
/// structure is left untouched. With [`PathEncoding::Double`] the path is first
/// normalized (empty and `.` segments dropped, `..` resolved, trailing slash
/// kept), then each segment is taken in the form the HTTP client sends it and
/// URI-encoded once more. Existing escapes are never decoded, so `%41` stays
/// distinct from `A`. Empty paths become `/`.
///
/// # Examples
///
/// ```
/// use iamgate_auth::canonical::{PathEncoding, build_canonical_uri};
///
/// assert_eq!(build_canonical_uri("/Dev/", PathEncoding::Double), "/Dev/");
/// assert_eq!(build_canonical_uri("/a b", PathEncoding::Single), "/a%20b");
/// assert_eq!(build_canonical_uri("/a b", PathEncoding::Double), "/a%2520b");
/// assert_eq!(build_canonical_uri("/a:b(c)", PathEncoding::Double), "/a%3Ab%28c%29");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str, encoding: PathEncoding) -> String {
    match encoding {
        PathEncoding::Single => encode_segments(path, |segment| {
            uri_encode(&percent_decode_str(segment).decode_utf8_lossy())
        }),
        PathEncoding::Double => encode_segments(&normalize_path(path), |segment| {
            uri_encode(&utf8_percent_encode(segment, WIRE_PATH_SET).to_string())
        }),
    }
}

/// Resolve dot segments and collapse repeated slashes in a path.
///
/// # Examples
///
/// ```
/// use iamgate_auth::canonical::normalize_path;
///
/// assert_eq!(normalize_path("/Dev//a/./b/../c/"), "/Dev/a/c/");
/// assert_eq!(normalize_path("/.."), "/");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return "/".to_owned();
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if path.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Split a request target into its path and raw query string.
#[must_use]
pub fn split_path_and_query(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

/// Build the canonical query string by sorting parameters.
///
/// Parameters are sorted by key name first, then by value for duplicate keys.
/// Values are kept exactly as they appear in the request target, since that
/// is the byte sequence the upstream will see.
///
/// # Examples
///
/// ```
/// use iamgate_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers string from the request headers.
///
/// Only headers listed in `signed_headers` are included. Header names are lowercased,
/// values are trimmed of leading/trailing whitespace and consecutive spaces are collapsed
/// to a single space. Headers are sorted by name.
///
/// The result does NOT include a trailing newline; the caller adds that as part of
/// the canonical request format (the double newline between headers and signed headers).
#[must_use]
pub fn build_canonical_headers(headers: &[(&str, &str)], signed_headers: &[&str]) -> String {
    // Repeated headers are joined with commas.
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let lower_name = name.to_lowercase();
        let trimmed_value = collapse_whitespace(value.trim());
        header_map
            .entry(lower_name)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&trimmed_value);
            })
            .or_insert(trimmed_value);
    }

    let mut sorted_signed: Vec<&str> = signed_headers.to_vec();
    sorted_signed.sort_unstable();
    sorted_signed.dedup();

    sorted_signed
        .iter()
        .filter_map(|name| header_map.get(*name).map(|value| format!("{name}:{value}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the signed headers string as a semicolon-separated list of lowercase header names.
///
/// # Examples
///
/// ```
/// use iamgate_auth::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["x-amz-date", "host"]),
///     "host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted: Vec<&str> = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join(";")
}

/// Whether a header (by lowercase name) takes part in the signature.
#[must_use]
pub fn is_signable_header(name: &str) -> bool {
    !UNSIGNABLE_HEADERS.contains(&name)
}

/// Apply `encode` to every `/`-separated segment of `path`.
fn encode_segments(path: &str, encode: impl Fn(&str) -> String) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/').map(encode).collect::<Vec<_>>().join("/")
}

/// URI-encode a single path segment using the AWS SigV4 encoding rules.
fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

/// Collapse consecutive whitespace characters in a string to a single space.
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
