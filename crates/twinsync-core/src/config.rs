// ── Runtime connector configuration ──
//
// Describes *what* to mirror and *how* to reach it. Never touches disk:
// the CLI (or any embedding application) builds a `ConnectorConfig` and
// hands it to `Connector::new`.

use twinsync_api::TransportConfig;
use url::Url;

use crate::error::CoreError;
use crate::model::ThingId;
use crate::reconnect::ReconnectConfig;

/// Suffix appended to each raw child name to form the subscribed twin id.
pub const DEFAULT_CHILD_SUFFIX: &str = "/sensor";

/// Configuration for one connector instance.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Base HTTP(S) API URL; the websocket URL is derived from it.
    pub api_url: Url,
    /// Application whose things are mirrored.
    pub application: String,
    /// Root twin whose `$children` lists the twins to mirror.
    pub root_id: ThingId,
    /// Appended to every child name (default `"/sensor"`).
    pub child_suffix: String,
    pub reconnect: ReconnectConfig,
    /// TLS and handshake timeout for the websocket transport.
    pub transport: TransportConfig,
}

impl ConnectorConfig {
    pub fn new(api_url: Url, application: impl Into<String>, root_id: impl Into<ThingId>) -> Self {
        Self {
            api_url,
            application: application.into(),
            root_id: root_id.into(),
            child_suffix: DEFAULT_CHILD_SUFFIX.to_owned(),
            reconnect: ReconnectConfig::default(),
            transport: TransportConfig::default(),
        }
    }

    /// Reject configurations the connector could never connect with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !matches!(self.api_url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(CoreError::config(format!(
                "API URL must use http or https, got '{}'",
                self.api_url.scheme()
            )));
        }
        if self.application.trim().is_empty() {
            return Err(CoreError::config("application must not be empty"));
        }
        if self.root_id.is_empty() {
            return Err(CoreError::config("root thing id must not be empty"));
        }
        if self.reconnect.initial_delay.is_zero() {
            return Err(CoreError::config("reconnect delay must be greater than zero"));
        }
        Ok(())
    }
}
