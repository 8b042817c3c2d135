//! Command handlers, one module per subcommand.

pub mod config_cmd;
pub mod snapshot;
pub mod watch;

use twinsync_core::Connector;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// Build a websocket connector from the active profile and flag overrides.
pub fn build_connector(global: &GlobalOpts) -> Result<Connector, CliError> {
    let resolved = config::resolve(global)?;
    tracing::debug!(
        profile = %resolved.profile_name,
        api = %resolved.config.api_url,
        application = %resolved.config.application,
        root = %resolved.config.root_id,
        "resolved connector settings"
    );
    Ok(Connector::websocket(resolved.config, resolved.credentials)?)
}
