//! CLI configuration: thin wrapper around `twinsync_config` that applies
//! `GlobalOpts` flag overrides (--api, --token, etc.).

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use twinsync_core::{ConnectorConfig, CredentialProvider};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use twinsync_config::{AuthSettings, Config, Profile};

/// Config file selected by `--config`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(twinsync_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(twinsync_config::load_config_from(&config_path(global))?)
}

pub fn save(cfg: &Config, global: &GlobalOpts) -> Result<PathBuf, CliError> {
    let path = config_path(global);
    twinsync_config::save_config_to(cfg, &path)?;
    Ok(path)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    cfg.profile_name(global.profile.as_deref()).to_owned()
}

/// Everything needed to build a connector.
pub struct Resolved {
    pub profile_name: String,
    pub config: ConnectorConfig,
    pub credentials: Arc<dyn CredentialProvider>,
}

/// Resolve the active profile plus flag overrides into connector settings.
///
/// Without a matching profile, `--api`, `--application`, `--root` and
/// `--token` must describe the connection on their own.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load(global)?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.api.is_some() => Profile {
            auth_mode: "token".into(),
            ..Profile::default()
        },
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path(global).display().to_string(),
            });
        }
    };
    apply_overrides(&mut profile, global);

    let auth = match global.token {
        Some(ref token) => AuthSettings::Token(SecretString::from(token.clone())),
        None => twinsync_config::resolve_auth(&profile, &profile_name)?,
    };

    let config = twinsync_config::profile_to_connector_config(&profile, &cfg.defaults)?;
    let credentials = auth.into_provider(&config.transport)?;

    Ok(Resolved {
        profile_name,
        config,
        credentials,
    })
}

/// CLI flag overrides take priority over profile values.
fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref api) = global.api {
        profile.api.clone_from(api);
    }
    if let Some(ref application) = global.application {
        profile.application.clone_from(application);
    }
    if let Some(ref root) = global.root {
        profile.root.clone_from(root);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}
