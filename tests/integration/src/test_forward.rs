//! Upstream forwarding of signed requests against a stub API Gateway.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap, HeaderValue, Method, StatusCode};
    use iamgate_auth::{FixedClock, SigV4Signer, SigningScope};
    use iamgate_core::{Credentials, SignedRequest, UnsignedRequest};
    use iamgate_proxy::{Forward, HttpForwarder, UpstreamError};
    use serde_json::{Value, json};

    use crate::{RecordedRequest, StubServer, closed_port_url};

    /// Sign a `GET /Dev/` with body `{"a":"aaaaa"}` aimed at `base_url`.
    fn signed_request(base_url: &str, host: &str) -> SignedRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let request = UnsignedRequest {
            host: host.to_owned(),
            method: Method::GET,
            path: "/Dev/".to_owned(),
            url: format!("{base_url}/Dev/"),
            body: r#"{"a":"aaaaa"}"#.to_owned(),
            headers,
        };

        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 15).unwrap());
        SigV4Signer::new(SigningScope::new("ap-northeast-1", "execute-api"))
            .with_clock(Arc::new(clock))
            .sign(request, &Credentials::new("AK", "SK", Some("TOK".to_owned())))
            .unwrap()
    }

    fn forwarder() -> HttpForwarder {
        HttpForwarder::new().unwrap()
    }

    #[tokio::test]
    async fn test_should_transmit_request_exactly_as_signed() {
        let server =
            StubServer::start(|_: &RecordedRequest| (StatusCode::OK, r#"{"ok":true}"#.to_owned()))
                .await;
        let signed = signed_request(&server.url(), &server.host());

        let body = forwarder().send(signed.clone()).await.unwrap();
        assert_eq!(body, json!({ "ok": true }));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let received = &requests[0];
        assert_eq!(received.method, Method::GET);
        assert_eq!(received.path, "/Dev/");
        assert_eq!(received.body, signed.body);
        assert_eq!(received.header("content-type"), Some("application/json"));
        assert_eq!(received.header("content-length"), Some("13"));
        assert_eq!(received.header("x-amz-date"), Some("20240301T093015Z"));
        assert_eq!(received.header("x-amz-security-token"), Some("TOK"));
        assert_eq!(
            received.header("authorization"),
            signed
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
        );
        assert_eq!(received.header("host"), Some(server.host().as_str()));
    }

    #[tokio::test]
    async fn test_should_report_non_success_status() {
        let server = StubServer::start(|_: &RecordedRequest| {
            (StatusCode::FORBIDDEN, r#"{"message":"Forbidden"}"#.to_owned())
        })
        .await;

        let err = forwarder()
            .send(signed_request(&server.url(), &server.host()))
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            UpstreamError::Status { status, body }
                if *status == StatusCode::FORBIDDEN && body == r#"{"message":"Forbidden"}"#
        ));
        assert_eq!(err.to_string(), "Request failed with status code 403");
    }

    #[tokio::test]
    async fn test_should_return_plain_text_body_as_string() {
        let server =
            StubServer::start(|_: &RecordedRequest| (StatusCode::OK, "pong".to_owned())).await;

        let body = forwarder()
            .send(signed_request(&server.url(), &server.host()))
            .await
            .unwrap();
        assert_eq!(body, Value::String("pong".to_owned()));
    }

    #[tokio::test]
    async fn test_should_report_transport_failure() {
        let base = closed_port_url();
        let host = base.trim_start_matches("http://").to_owned();

        let err = forwarder()
            .send(signed_request(&base, &host))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
    }
}
