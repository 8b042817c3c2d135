#![allow(clippy::unwrap_used)]
// Integration tests for `ClientCredentials` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use twinsync_api::{ClientCredentials, CredentialProvider, Error};

// ── Helpers ─────────────────────────────────────────────────────────

const TOKEN_PATH: &str = "/realms/twins/protocol/openid-connect/token";

async fn setup() -> (MockServer, ClientCredentials) {
    let server = MockServer::start().await;
    let token_url = Url::parse(&format!("{}{TOKEN_PATH}", server.uri())).unwrap();
    let provider = ClientCredentials::with_client(
        reqwest::Client::new(),
        token_url,
        "connector",
        SecretString::from("s3cret".to_string()),
    );
    (server, provider)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetches_token_with_client_credentials_grant() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=connector"))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "eyJ.token",
            "expires_in": 300,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = provider.access_token().await.unwrap();
    assert_eq!(token.expose_secret(), "eyJ.token");
}

#[tokio::test]
async fn test_token_is_cached_until_expiry() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cached",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    for _ in 0..3 {
        let token = provider.access_token().await.unwrap();
        assert_eq!(token.expose_secret(), "cached");
    }
}

#[tokio::test]
async fn test_short_lived_token_is_refetched() {
    let (server, provider) = setup().await;

    // Lifetime below the refresh margin: never served from cache.
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "short",
            "expires_in": 10
        })))
        .expect(2)
        .mount(&server)
        .await;

    provider.access_token().await.unwrap();
    provider.access_token().await.unwrap();
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&server)
        .await;

    let provider: &dyn CredentialProvider = &provider;
    provider.access_token().await.unwrap();
    provider.invalidate().await;
    provider.access_token().await.unwrap();
}

#[tokio::test]
async fn test_scope_is_sent_when_configured() {
    let (server, provider) = setup().await;
    let provider = provider.with_scope("twins:read");

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("scope=twins%3Aread"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "scoped"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = provider.access_token().await.unwrap();
    assert_eq!(token.expose_secret(), "scoped");
}

#[tokio::test]
async fn test_rejected_client_is_token_endpoint_error() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let err = provider.access_token().await.unwrap_err();
    assert!(err.is_credential_failure());
    match err {
        Error::TokenEndpoint { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid_client");
        }
        other => panic!("expected TokenEndpoint error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_garbage_response_is_decode_error() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = provider.access_token().await;
    assert!(
        matches!(result, Err(Error::Decode { .. })),
        "expected Decode error, got: {result:?}"
    );
}
