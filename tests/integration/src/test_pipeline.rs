//! End-to-end runs of the signing pipeline: metadata stub, signer and a stub
//! upstream.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use http::{Method, StatusCode};
    use iamgate_auth::{MetadataCredentialSource, StaticCredentialSource};
    use iamgate_core::{ProxyConfig, SignedRequest};
    use iamgate_proxy::{Forward, HttpForwarder, ProxyError, SigningProxy, UpstreamError};
    use serde_json::{Value, json};

    use crate::{RecordedRequest, StubServer};

    const GATEWAY_HOST: &str = "example.execute-api.ap-northeast-1.amazonaws.com";

    /// Sends to a local stub instead of the real gateway, keeping the signed
    /// path, headers and body.
    #[derive(Debug)]
    struct LocalForwarder {
        inner: HttpForwarder,
        base_url: String,
    }

    #[async_trait]
    impl Forward for LocalForwarder {
        async fn send(&self, mut request: SignedRequest) -> Result<Value, UpstreamError> {
            request.url = format!("{}{}", self.base_url, request.path);
            self.inner.send(request).await
        }
    }

    async fn metadata_stub() -> StubServer {
        StubServer::start(|req: &RecordedRequest| match req.path.as_str() {
            "/latest/meta-data/iam/security-credentials/" => (StatusCode::OK, "myRole".to_owned()),
            "/latest/meta-data/iam/security-credentials/myRole" => (
                StatusCode::OK,
                r#"{"Code":"Success","AccessKeyId":"AK","SecretAccessKey":"SK","Token":"TOK","Expiration":"2099-01-01T00:00:00Z"}"#
                    .to_owned(),
            ),
            _ => (StatusCode::NOT_FOUND, String::new()),
        })
        .await
    }

    fn config() -> ProxyConfig {
        ProxyConfig {
            api_gateway_host: GATEWAY_HOST.to_owned(),
            api_gateway_stage: "Dev".to_owned(),
            ..ProxyConfig::default()
        }
    }

    fn proxy_via(metadata: &StubServer, upstream: &StubServer) -> SigningProxy {
        let credentials = MetadataCredentialSource::with_client(reqwest::Client::new(), metadata.url());
        let forwarder = LocalForwarder {
            inner: HttpForwarder::new().unwrap(),
            base_url: upstream.url(),
        };
        SigningProxy::new(&config(), Arc::new(credentials), Arc::new(forwarder))
    }

    #[tokio::test]
    async fn test_should_forward_with_instance_credentials() {
        let metadata = metadata_stub().await;
        let upstream = StubServer::start(|req: &RecordedRequest| {
            (StatusCode::OK, json!({ "received": req.body }).to_string())
        })
        .await;

        let proxy = proxy_via(&metadata, &upstream);
        let response = proxy
            .forward(Method::GET, "/", &json!({ "a": "aaaaa" }))
            .await
            .unwrap();
        assert_eq!(response, json!({ "received": r#"{"a":"aaaaa"}"# }));

        let received = &upstream.requests()[0];
        assert_eq!(received.path, "/Dev/");
        assert_eq!(received.body, r#"{"a":"aaaaa"}"#);
        assert_eq!(received.header("x-amz-security-token"), Some("TOK"));

        let authorization = received.header("authorization").unwrap();
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AK/"));
        assert!(authorization.contains("/ap-northeast-1/execute-api/aws4_request, "));
        assert!(authorization.contains(
            "SignedHeaders=content-length;content-type;host;x-amz-date;x-amz-security-token, "
        ));
    }

    #[tokio::test]
    async fn test_should_surface_upstream_rejection() {
        let metadata = metadata_stub().await;
        let upstream = StubServer::start(|_: &RecordedRequest| {
            (StatusCode::FORBIDDEN, r#"{"message":"Forbidden"}"#.to_owned())
        })
        .await;

        let err = proxy_via(&metadata, &upstream)
            .forward(Method::GET, "/", &json!({ "a": "aaaaa" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Upstream(UpstreamError::Status { .. })));
        assert_eq!(err.to_string(), "Request failed with status code 403");
    }

    #[tokio::test]
    async fn test_should_not_contact_upstream_without_credentials() {
        let metadata =
            StubServer::start(|_: &RecordedRequest| (StatusCode::NOT_FOUND, String::new())).await;
        let upstream = StubServer::start(|_: &RecordedRequest| (StatusCode::OK, "{}".to_owned())).await;

        let err = proxy_via(&metadata, &upstream)
            .forward(Method::GET, "/", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "credential_unavailable");
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_sign_with_environment_credentials() {
        let upstream = StubServer::start(|_: &RecordedRequest| (StatusCode::OK, "{}".to_owned())).await;
        let credentials = StaticCredentialSource::new(
            Some("ENVKEY".to_owned()),
            Some("ENVSECRET".to_owned()),
            Some("ENVTOKEN".to_owned()),
        );
        let forwarder = LocalForwarder {
            inner: HttpForwarder::new().unwrap(),
            base_url: upstream.url(),
        };
        let proxy = SigningProxy::new(&config(), Arc::new(credentials), Arc::new(forwarder));

        proxy.forward(Method::GET, "/", &json!({})).await.unwrap();

        let received = &upstream.requests()[0];
        assert_eq!(received.header("x-amz-security-token"), Some("ENVTOKEN"));
        assert!(
            received
                .header("authorization")
                .unwrap()
                .contains("Credential=ENVKEY/")
        );
    }
}
