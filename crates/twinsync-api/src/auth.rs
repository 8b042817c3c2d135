//! Access token providers.
//!
//! The connector asks a [`CredentialProvider`] for a fresh token before every
//! connection attempt. Two implementations ship here:
//!
//! - [`StaticToken`] for pre-issued tokens (and tests).
//! - [`ClientCredentials`] for the OAuth2 client credentials grant against an
//!   OIDC token endpoint, with the token cached until shortly before expiry.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Tokens are refreshed this long before the server-declared expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// Source of access tokens for the notification endpoint.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, Error>;

    /// Forget any cached token. Called after a failed connect so the next
    /// attempt does not reuse a token the server may have rejected.
    async fn invalidate(&self) {}
}

// ── StaticToken ──────────────────────────────────────────────────────

/// A fixed, pre-issued token.
#[derive(Debug, Clone)]
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<SecretString, Error> {
        if self.0.expose_secret().is_empty() {
            return Err(Error::Credentials {
                message: "static token is empty".into(),
            });
        }
        Ok(self.0.clone())
    }
}

// ── ClientCredentials ────────────────────────────────────────────────

/// OAuth2 client credentials grant with in-memory token caching.
pub struct ClientCredentials {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
    scope: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ClientCredentials {
    /// Create a provider, building its HTTP client from `transport`.
    pub fn new(
        token_url: Url,
        client_id: impl Into<String>,
        client_secret: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(
            transport.build_client()?,
            token_url,
            client_id,
            client_secret,
        ))
    }

    /// Create a provider around an existing `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        token_url: Url,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            http,
            token_url,
            client_id: client_id.into(),
            client_secret,
            scope: None,
            cached: Mutex::new(None),
        }
    }

    /// Request a specific scope with every token.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    async fn fetch(&self) -> Result<CachedToken, Error> {
        tracing::debug!(url = %self.token_url, client_id = %self.client_id, "Requesting access token");

        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];
        if let Some(ref scope) = self.scope {
            form.push(("scope", scope.as_str()));
        }

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| Error::Decode {
            message: format!("token response: {e}"),
            body: String::new(),
        })?;

        if parsed.access_token.is_empty() {
            return Err(Error::Credentials {
                message: "token endpoint returned an empty access token".into(),
            });
        }

        let lifetime = parsed
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);

        Ok(CachedToken {
            token: SecretString::from(parsed.access_token),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentials {
    async fn access_token(&self) -> Result<SecretString, Error> {
        let mut cached = self.cached.lock().await;

        if let Some(ref entry) = *cached {
            if Instant::now() < entry.refresh_at {
                return Ok(entry.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            tracing::debug!(client_id = %self.client_id, "cached access token dropped");
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
