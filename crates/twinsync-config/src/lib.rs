//! Configuration for twinsync.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `twinsync_core::ConnectorConfig` plus a ready-to-use
//! credential provider. The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use twinsync_api::{ClientCredentials, StaticToken};
use twinsync_core::{
    ConnectorConfig, CredentialProvider, DEFAULT_CHILD_SUFFIX, ReconnectConfig, ThingId,
    TransportConfig,
};

/// Service name under which secrets are stored in the system keyring.
pub const KEYRING_SERVICE: &str = "twinsync";

/// Prefix for environment overrides, e.g. `TWINSYNC_DEFAULT_PROFILE`.
pub const ENV_PREFIX: &str = "TWINSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured for profile '{profile}'")]
    NoCredentials { profile: String, what: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot build credential provider: {0}")]
    Client(#[from] twinsync_api::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named connector profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: `requested`, else the configured default.
    pub fn profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Handshake / token request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to wait before reconnecting.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,

    /// Upper bound for exponential backoff. Unset means a fixed delay of
    /// whatever `reconnect_delay` resolves to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_delay: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            reconnect_delay: default_reconnect_delay(),
            max_reconnect_delay: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_reconnect_delay() -> u64 {
    5
}

/// A named connector profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// HTTP(S) base URL of the twin API (e.g. "https://api.example.com").
    pub api: String,

    /// Application whose things are mirrored.
    pub application: String,

    /// Root thing listing the children to mirror.
    pub root: String,

    /// Suffix appended to child names (default "/sensor").
    pub child_suffix: Option<String>,

    /// Auth mode: "client-credentials" (OIDC) or "token".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// Pre-issued access token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable containing the access token.
    pub token_env: Option<String>,

    /// OIDC token endpoint for the client credentials grant.
    pub token_url: Option<String>,

    pub client_id: Option<String>,

    /// Client secret (plaintext; prefer keyring or env var).
    pub client_secret: Option<String>,

    /// Environment variable containing the client secret.
    pub client_secret_env: Option<String>,

    /// Optional OAuth2 scope.
    pub scope: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override reconnect delay.
    pub reconnect_delay: Option<u64>,

    /// Override backoff ceiling.
    pub max_reconnect_delay: Option<u64>,
}

fn default_auth_mode() -> String {
    "client-credentials".into()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api: String::new(),
            application: String::new(),
            root: String::new(),
            child_suffix: None,
            auth_mode: default_auth_mode(),
            token: None,
            token_env: None,
            token_url: None,
            client_id: None,
            client_secret: None,
            client_secret_env: None,
            scope: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            reconnect_delay: None,
            max_reconnect_delay: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "twinsync", "twinsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("twinsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from `path` + environment.
///
/// Env keys nest with a double underscore:
/// `TWINSYNC_PROFILES__LAB__APPLICATION=demo`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Where a connector gets its access tokens from.
#[derive(Debug, Clone)]
pub enum AuthSettings {
    /// Pre-issued access token.
    Token(SecretString),
    /// OIDC client credentials grant.
    ClientCredentials {
        token_url: Url,
        client_id: String,
        client_secret: SecretString,
        scope: Option<String>,
    },
}

impl AuthSettings {
    /// Build the credential provider these settings describe.
    pub fn into_provider(
        self,
        transport: &TransportConfig,
    ) -> Result<Arc<dyn CredentialProvider>, ConfigError> {
        match self {
            Self::Token(token) => Ok(Arc::new(StaticToken::new(token))),
            Self::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scope,
            } => {
                let mut provider =
                    ClientCredentials::new(token_url, client_id, client_secret, transport)?;
                if let Some(scope) = scope {
                    provider = provider.with_scope(scope);
                }
                Ok(Arc::new(provider))
            }
        }
    }
}

/// Resolve one secret through the chain: env var named by `env_name`,
/// then the system keyring entry `{profile_name}/{key}`, then `plaintext`.
pub fn resolve_secret(
    env_name: Option<&str>,
    key: &str,
    plaintext: Option<&str>,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Env var named in the profile
    if let Some(env_name) = env_name {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{key}")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(value) = plaintext {
        return Ok(SecretString::from(value.to_owned()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        what: key.into(),
    })
}

/// Store a secret in the system keyring under `{profile_name}/{key}`.
pub fn store_secret(profile_name: &str, key: &str, secret: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{key}"))
        .and_then(|entry| entry.set_password(secret))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

/// Resolve [`AuthSettings`] from a profile's `auth_mode` field.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthSettings, ConfigError> {
    match profile.auth_mode.as_str() {
        "token" => {
            let token = resolve_secret(
                profile.token_env.as_deref(),
                "token",
                profile.token.as_deref(),
                profile_name,
            )?;
            Ok(AuthSettings::Token(token))
        }
        "client-credentials" => {
            let token_url = required(profile.token_url.as_deref(), "token_url", profile_name)?;
            let token_url = parse_url("token_url", token_url)?;
            let client_id = required(profile.client_id.as_deref(), "client_id", profile_name)?;
            let client_secret = resolve_secret(
                profile.client_secret_env.as_deref(),
                "client-secret",
                profile.client_secret.as_deref(),
                profile_name,
            )?;
            Ok(AuthSettings::ClientCredentials {
                token_url,
                client_id: client_id.to_owned(),
                client_secret,
                scope: profile.scope.clone(),
            })
        }
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'client-credentials' or 'token', got '{other}'"),
        }),
    }
}

fn required<'a>(
    value: Option<&'a str>,
    field: &str,
    profile_name: &str,
) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            what: field.into(),
        })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `ConnectorConfig` from a profile and the global defaults, with
/// no CLI flag overrides.
pub fn profile_to_connector_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ConnectorConfig, ConfigError> {
    let api_url = parse_url("api", &profile.api)?;

    let transport = TransportConfig {
        tls: tls_mode(profile, defaults),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    };

    let initial = profile.reconnect_delay.unwrap_or(defaults.reconnect_delay);
    let max = profile
        .max_reconnect_delay
        .or(defaults.max_reconnect_delay)
        .unwrap_or(initial);
    let reconnect =
        ReconnectConfig::backoff(Duration::from_secs(initial), Duration::from_secs(max));

    let config = ConnectorConfig {
        api_url,
        application: profile.application.clone(),
        root_id: ThingId::new(profile.root.as_str()),
        child_suffix: profile
            .child_suffix
            .clone()
            .unwrap_or_else(|| DEFAULT_CHILD_SUFFIX.to_owned()),
        reconnect,
        transport,
    };

    config.validate().map_err(|e| ConfigError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

fn tls_mode(profile: &Profile, defaults: &Defaults) -> twinsync_api::TlsMode {
    if profile.insecure.unwrap_or(defaults.insecure) {
        twinsync_api::TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        twinsync_api::TlsMode::CustomCa(ca_path.clone())
    } else {
        twinsync_api::TlsMode::System
    }
}
