//! Instance metadata credential discovery against a stub metadata service.

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};
    use iamgate_auth::{CredentialError, CredentialSource, MetadataCredentialSource};

    use crate::{RecordedRequest, StubServer, closed_port_url};

    const ROLES_PATH: &str = "/latest/meta-data/iam/security-credentials/";

    fn credentials_document(expiration: &str) -> String {
        format!(
            r#"{{
                "Code": "Success",
                "LastUpdated": "2024-03-01T09:00:00Z",
                "Type": "AWS-HMAC",
                "AccessKeyId": "AK",
                "SecretAccessKey": "SK",
                "Token": "TOK",
                "Expiration": "{expiration}"
            }}"#
        )
    }

    /// Metadata service with role `myRole` whose credentials document is `document`.
    async fn metadata_stub(document: String) -> StubServer {
        StubServer::start(move |req: &RecordedRequest| match req.path.as_str() {
            ROLES_PATH => (StatusCode::OK, "myRole\n".to_owned()),
            "/latest/meta-data/iam/security-credentials/myRole" => {
                (StatusCode::OK, document.clone())
            }
            _ => (StatusCode::NOT_FOUND, String::new()),
        })
        .await
    }

    fn source_for(server: &StubServer) -> MetadataCredentialSource {
        MetadataCredentialSource::with_client(reqwest::Client::new(), server.url())
    }

    #[tokio::test]
    async fn test_should_resolve_credentials_of_attached_role() {
        let server = metadata_stub(credentials_document("2099-01-01T00:00:00Z")).await;

        let creds = source_for(&server).resolve().await.unwrap();
        assert_eq!(creds.access_key_id, "AK");
        assert_eq!(creds.secret_access_key, "SK");
        assert_eq!(creds.session_token.as_deref(), Some("TOK"));
        assert!(creds.expires_at.is_some());

        let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                ROLES_PATH.to_owned(),
                "/latest/meta-data/iam/security-credentials/myRole".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn test_should_fetch_fresh_credentials_on_every_resolve() {
        let server = metadata_stub(credentials_document("2099-01-01T00:00:00Z")).await;
        let source = source_for(&server);

        source.resolve().await.unwrap();
        source.resolve().await.unwrap();
        assert_eq!(server.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_should_fail_when_role_listing_is_missing() {
        let server = StubServer::start(|_: &RecordedRequest| (StatusCode::NOT_FOUND, String::new())).await;

        let err = source_for(&server).resolve().await.unwrap_err();
        assert!(
            matches!(err, CredentialError::MetadataStatus { status: 404, .. }),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_should_fail_when_no_role_is_attached() {
        let server = StubServer::start(|_: &RecordedRequest| (StatusCode::OK, "\n".to_owned())).await;

        let err = source_for(&server).resolve().await.unwrap_err();
        assert!(matches!(err, CredentialError::NoRoleAttached));
    }

    #[tokio::test]
    async fn test_should_reject_malformed_document() {
        let server = metadata_stub("not json".to_owned()).await;

        let err = source_for(&server).resolve().await.unwrap_err();
        assert!(matches!(err, CredentialError::MalformedCredentials(_)));
    }

    #[tokio::test]
    async fn test_should_reject_unsuccessful_document() {
        let document = r#"{"Code":"AssumeRoleUnauthorizedAccess","AccessKeyId":"AK","SecretAccessKey":"SK","Token":"TOK"}"#;
        let server = metadata_stub(document.to_owned()).await;

        let err = source_for(&server).resolve().await.unwrap_err();
        assert!(matches!(err, CredentialError::MalformedCredentials(_)));
        assert!(err.to_string().contains("AssumeRoleUnauthorizedAccess"));
    }

    #[tokio::test]
    async fn test_should_reject_document_without_session_token() {
        let server = metadata_stub(r#"{"AccessKeyId":"AK","SecretAccessKey":"SK"}"#.to_owned()).await;

        let err = source_for(&server).resolve().await.unwrap_err();
        assert!(matches!(err, CredentialError::MalformedCredentials(_)));
    }

    #[tokio::test]
    async fn test_should_reject_empty_session_token() {
        let document =
            r#"{"Code":"Success","AccessKeyId":"AK","SecretAccessKey":"SK","Token":""}"#;
        let server = metadata_stub(document.to_owned()).await;

        let err = source_for(&server).resolve().await.unwrap_err();
        assert!(matches!(err, CredentialError::MalformedCredentials(_)));
        assert!(err.to_string().contains("empty session token"));
    }

    #[tokio::test]
    async fn test_should_reject_expired_credentials() {
        let server = metadata_stub(credentials_document("2000-01-01T00:00:00Z")).await;

        let err = source_for(&server).resolve().await.unwrap_err();
        assert!(matches!(err, CredentialError::Expired(_)));
    }

    #[tokio::test]
    async fn test_should_send_session_token_when_ttl_is_configured() {
        let document = credentials_document("2099-01-01T00:00:00Z");
        let server = StubServer::start(move |req: &RecordedRequest| {
            if req.method == Method::PUT && req.path == "/latest/api/token" {
                return (StatusCode::OK, "session-abc".to_owned());
            }
            if req.header("x-aws-ec2-metadata-token") != Some("session-abc") {
                return (StatusCode::UNAUTHORIZED, String::new());
            }
            match req.path.as_str() {
                ROLES_PATH => (StatusCode::OK, "myRole".to_owned()),
                "/latest/meta-data/iam/security-credentials/myRole" => {
                    (StatusCode::OK, document.clone())
                }
                _ => (StatusCode::NOT_FOUND, String::new()),
            }
        })
        .await;

        let source = source_for(&server).with_token_ttl(Some(21600));
        let creds = source.resolve().await.unwrap();
        assert_eq!(creds.access_key_id, "AK");

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(
            requests[0].header("x-aws-ec2-metadata-token-ttl-seconds"),
            Some("21600")
        );
    }

    #[tokio::test]
    async fn test_should_report_unreachable_metadata_service() {
        let source = MetadataCredentialSource::with_client(reqwest::Client::new(), closed_port_url());

        let err = source.resolve().await.unwrap_err();
        assert!(matches!(err, CredentialError::MetadataUnreachable { .. }));
    }
}
