use thiserror::Error;

/// Top-level error type for the `twinsync-api` crate.
///
/// Covers every failure mode below the connector: credential acquisition,
/// URL derivation, TLS setup, the websocket handshake, and message decoding.
/// `twinsync-core` folds these into reconnect decisions, never into panics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Credentials ─────────────────────────────────────────────────
    /// No usable access token could be produced.
    #[error("Credential acquisition failed: {message}")]
    Credentials { message: String },

    /// The token endpoint answered with a non-success status.
    #[error("Token endpoint returned HTTP {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The API URL uses a scheme that has no websocket counterpart.
    #[error("Unsupported URL scheme '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    /// The API URL cannot carry a path (e.g. `mailto:`).
    #[error("URL cannot be used as a base: {0}")]
    CannotBeABase(String),

    /// Handshake did not complete in time.
    #[error("Connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// Inbound message could not be decoded, with the raw text for debugging.
    #[error("Failed to decode message: {message}")]
    Decode { message: String, body: String },

    /// Outbound message could not be encoded.
    #[error("Failed to encode message: {0}")]
    Encode(String),
}

impl Error {
    /// Returns `true` if the failure happened while obtaining credentials.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::Credentials { .. } | Self::TokenEndpoint { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::TokenEndpoint { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }
}
