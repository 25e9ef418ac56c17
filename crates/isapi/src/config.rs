//! Layering of global CLI flags over `isapi-config` profiles.
//!
//! Precedence for every setting: flag / env var, then profile, then the
//! `[defaults]` table.

use secrecy::SecretString;

use isapi_api::ClientConfig;
use isapi_config::{Config, ConfigError, Overrides, Profile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build a `ClientConfig` from the config file, active profile, and flags.
pub fn resolve_client_config(
    global: &GlobalOpts,
    cfg: &Config,
) -> Result<ClientConfig, CliError> {
    let overrides = overrides(global);

    match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => Ok(isapi_config::profile_to_client_config(
            profile,
            name,
            &cfg.defaults,
            &overrides,
        )?),

        // An explicitly named profile must exist.
        Err(ConfigError::UnknownProfile { profile }) if global.profile.is_some() => {
            Err(CliError::ProfileNotFound {
                name: profile,
                available: available_profiles(cfg),
            })
        }

        // No profile at all: flags must carry everything.
        Err(_) => resolve_flags_only(global, cfg, &overrides),
    }
}

fn overrides(global: &GlobalOpts) -> Overrides {
    Overrides {
        host: global.host.clone(),
        username: global.username.clone(),
        password: global.password.clone().map(SecretString::from),
        timeout: global.timeout,
        insecure: global.insecure,
    }
}

fn resolve_flags_only(
    global: &GlobalOpts,
    cfg: &Config,
    overrides: &Overrides,
) -> Result<ClientConfig, CliError> {
    let no_config = || CliError::NoConfig {
        path: isapi_config::config_path().display().to_string(),
    };

    let host = global.host.as_deref().ok_or_else(no_config)?;
    let username = global.username.as_deref().ok_or_else(no_config)?;
    if overrides.password.is_none() {
        return Err(CliError::NoCredentials {
            profile: "(none)".into(),
        });
    }

    let profile = Profile::new(host, username);
    Ok(isapi_config::profile_to_client_config(
        &profile,
        "(none)",
        &cfg.defaults,
        overrides,
    )?)
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}
