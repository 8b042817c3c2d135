//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
        if profile.client_secret.is_some() {
            profile.client_secret = Some(MASK.into());
        }
    }
    cfg
}

fn render_config(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    let cfg = redacted(cfg);
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&cfg)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(&cfg)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&cfg)?),
        OutputFormat::Table | OutputFormat::Plain => {
            toml::to_string_pretty(&cfg).map_err(|e| CliError::Render(e.to_string()))
        }
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_text(prompt: &str, default: Option<&str>) -> Result<String, CliError> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_owned());
    }
    input.interact_text().map_err(prompt_err)
}

fn prompt_secret(prompt: &str, field: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Offer to store a secret in the system keyring or return it for plaintext config.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_keyring_storage(
    secret: &str,
    profile_name: &str,
    key: &str,
    label: &str,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {label}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        twinsync_config::store_secret(profile_name, key, secret)?;
        eprintln!("   ✓ {label} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret.to_owned()))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

/// Apply one `config set` assignment to a profile.
fn set_profile_value(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key.replace('-', "_").as_str() {
        "api" => profile.api = value,
        "application" => profile.application = value,
        "root" => profile.root = value,
        "child_suffix" => profile.child_suffix = Some(value),
        "auth_mode" => {
            if !matches!(value.as_str(), "client-credentials" | "token") {
                return Err(CliError::Validation {
                    field: "auth_mode".into(),
                    reason: "must be 'client-credentials' or 'token'".into(),
                });
            }
            profile.auth_mode = value;
        }
        "token" => profile.token = Some(value),
        "token_env" => profile.token_env = Some(value),
        "token_url" => profile.token_url = Some(value),
        "client_id" => profile.client_id = Some(value),
        "client_secret" => profile.client_secret = Some(value),
        "client_secret_env" => profile.client_secret_env = Some(value),
        "scope" => profile.scope = Some(value),
        "ca_cert" => profile.ca_cert = Some(value.into()),
        "insecure" => profile.insecure = Some(parse_value(key, &value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_value(key, &value, "a number (seconds)")?),
        "reconnect_delay" => {
            profile.reconnect_delay = Some(parse_value(key, &value, "a number (seconds)")?);
        }
        "max_reconnect_delay" => {
            profile.max_reconnect_delay = Some(parse_value(key, &value, "a number (seconds)")?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: api, application, root, \
                     child_suffix, auth_mode, token, token_env, token_url, client_id, \
                     client_secret, client_secret_env, scope, ca_cert, insecure, timeout, \
                     reconnect_delay, max_reconnect_delay"
                ),
            });
        }
    }
    Ok(())
}

// ── Init wizard ─────────────────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path(global);
    eprintln!("✨ twinsync configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name = prompt_text("Profile name", Some("default"))?;
    let api = prompt_text("Twin API URL", Some("https://api.example.com"))?;
    let application = prompt_text("Application", None)?;
    let root = prompt_text("Root twin id", None)?;

    let auth_choices = &["OIDC client credentials (recommended)", "Pre-issued access token"];
    let auth_selection = Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile {
        api,
        application,
        root,
        ..Profile::default()
    };

    if auth_selection == 0 {
        profile.auth_mode = "client-credentials".into();
        profile.token_url = Some(prompt_text("Token endpoint URL", None)?);
        profile.client_id = Some(prompt_text("Client ID", None)?);
        let secret = prompt_secret("Client secret: ", "client_secret")?;
        profile.client_secret =
            prompt_keyring_storage(&secret, &profile_name, "client-secret", "client secret")?;
    } else {
        profile.auth_mode = "token".into();
        let token = prompt_secret("Access token: ", "token")?;
        profile.token = prompt_keyring_storage(&token, &profile_name, "token", "token")?;
    }

    // Validate before writing anything.
    let mut cfg = config::load(global)?;
    twinsync_config::profile_to_connector_config(&profile, &cfg.defaults)?;

    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    let path = config::save(&cfg, global)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: twinsync snapshot");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = render_config(&cfg, global.output)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load(global)?;
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_profile_value(profile, &key, value)?;

            config::save(&cfg, global)?;
            if !global.quiet {
                eprintln!("✓ Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let default = cfg.profile_name(None);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: twinsync config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load(global)?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save(&cfg, global)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetSecret { profile } => {
            let cfg = config::load(global)?;
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let prof = cfg
                .profiles
                .get(&profile_name)
                .ok_or_else(|| CliError::ProfileNotFound {
                    name: profile_name.clone(),
                    available: config::available_profiles(&cfg),
                })?;

            let (key, prompt) = if prof.auth_mode == "token" {
                ("token", "Access token: ")
            } else {
                ("client-secret", "Client secret: ")
            };
            let secret = prompt_secret(prompt, key)?;
            twinsync_config::store_secret(&profile_name, key, &secret)?;

            eprintln!("✓ Secret stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_accepts_dashed_keys_and_parses_numbers() {
        let mut profile = Profile::default();
        set_profile_value(&mut profile, "reconnect-delay", "10".into()).unwrap();
        set_profile_value(&mut profile, "insecure", "true".into()).unwrap();
        assert_eq!(profile.reconnect_delay, Some(10));
        assert_eq!(profile.insecure, Some(true));
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut profile = Profile::default();
        assert!(set_profile_value(&mut profile, "colour", "red".into()).is_err());
        assert!(set_profile_value(&mut profile, "timeout", "soon".into()).is_err());
        assert!(set_profile_value(&mut profile, "auth_mode", "kerberos".into()).is_err());
    }

    #[test]
    fn show_masks_plaintext_secrets() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                token: Some("hunter2".into()),
                client_secret: Some("s3cret".into()),
                ..Profile::default()
            },
        );
        let out = render_config(&cfg, OutputFormat::Plain).unwrap();
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("s3cret"));
        assert!(out.contains(MASK));
    }
}
