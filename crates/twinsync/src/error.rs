//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use twinsync_config::ConfigError;
use twinsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(twinsync::connection_failed),
        help(
            "Check that the twin API is reachable: {reason}\n\
             Try: twinsync snapshot --insecure -vv"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(twinsync::auth_failed),
        help(
            "Verify the profile's token or client credentials.\n\
             Run: twinsync config set-secret"
        )
    )]
    AuthFailed { message: String },

    #[error("No {what} configured for profile '{profile}'")]
    #[diagnostic(
        code(twinsync::no_credentials),
        help(
            "Configure credentials with: twinsync config init\n\
             Or pass --token / set TWINSYNC_TOKEN."
        )
    )]
    NoCredentials { profile: String, what: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(twinsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(twinsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: twinsync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No profile configured")]
    #[diagnostic(
        code(twinsync::no_config),
        help(
            "Create one with: twinsync config init\n\
             Expected at: {path}\n\
             Or pass --api, --application, --root and --token."
        )
    )]
    NoConfig { path: String },

    #[error("{0}")]
    #[diagnostic(code(twinsync::config))]
    Config(String),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("No data received within {seconds}s")]
    #[diagnostic(
        code(twinsync::timeout),
        help("Increase --wait, or check that the root twin lists children.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(twinsync::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            Self::Config(_) | Self::Io(_) | Self::Render(_) => exit_code::GENERAL,
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Render(err.to_string())
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Protocol { message } => Self::Validation {
                field: "protocol".into(),
                reason: message,
            },
            CoreError::Config { message } => Self::Validation {
                field: "profile".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile, what } => Self::NoCredentials { profile, what },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: "(see: twinsync config profiles)".into(),
            },
            ConfigError::Io(e) => Self::Io(e),
            ConfigError::Client(e) => CoreError::from(e).into(),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                Self::Config(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let auth = CliError::from(CoreError::AuthenticationFailed {
            message: "401".into(),
        });
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let missing = CliError::from(ConfigError::UnknownProfile {
            name: "lab".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let invalid = CliError::from(ConfigError::Validation {
            field: "api".into(),
            reason: "bad".into(),
        });
        assert_eq!(invalid.exit_code(), exit_code::USAGE);

        assert_eq!(
            CliError::Timeout { seconds: 3 }.exit_code(),
            exit_code::TIMEOUT
        );
    }
}
