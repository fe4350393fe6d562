//! Response body type and JSON response helpers shared by the gateway routes.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderValue, StatusCode};
use http_body_util::Full;
use serde_json::Value;

/// Response body used by every route.
pub type GatewayBody = Full<Bytes>;

/// Header carrying the per-request identifier.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Build a JSON response with the given status.
pub fn json_response(status: StatusCode, value: &Value) -> http::Response<GatewayBody> {
    let mut response = http::Response::new(Full::new(Bytes::from(value.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Attach `request_id` to a response.
pub fn with_request_id(
    mut response: http::Response<GatewayBody>,
    request_id: &str,
) -> http::Response<GatewayBody> {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
