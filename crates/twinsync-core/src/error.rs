// ── Core error types ──
//
// The connector itself never fails: every runtime problem becomes a
// reconnect. `CoreError` covers what callers can get wrong up front
// (configuration) and translates api errors for surfaces that build
// collaborators outside the connector (e.g. the CLI's credential setup).

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ── Conversion from api errors ───────────────────────────────────────

impl From<twinsync_api::Error> for CoreError {
    fn from(err: twinsync_api::Error) -> Self {
        use twinsync_api::Error as Api;

        match err {
            Api::Credentials { message } => CoreError::AuthenticationFailed { message },
            Api::TokenEndpoint { status, body } => CoreError::AuthenticationFailed {
                message: format!("token endpoint returned HTTP {status}: {body}"),
            },
            // reqwest does not report which timeout fired
            Api::Transport(ref e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: if e.is_timeout() {
                    format!("request timed out: {e}")
                } else {
                    e.to_string()
                },
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            Api::Tls(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            Api::InvalidUrl(e) => CoreError::config(format!("invalid URL: {e}")),
            Api::UnsupportedScheme(_) | Api::CannotBeABase(_) => CoreError::config(err.to_string()),
            Api::Decode { message, .. } | Api::Encode(message) => CoreError::Protocol { message },
        }
    }
}
