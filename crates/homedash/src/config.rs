//! CLI configuration: a thin wrapper around `homedash_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--server,
//! --token, --demo, etc.).

use secrecy::SecretString;

use homedash_core::{AuthCredentials, DashboardConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use homedash_config::{Config, Profile, config_path, load_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Overlay flag values onto a profile. Flags win over profile values.
fn apply_flags(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if let Some(ref api) = global.api {
        profile.api = Some(api.clone());
    }
    if global.demo {
        profile.demo = true;
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    profile
}

/// Build a `DashboardConfig` from the config file, profile, and flags.
///
/// Without a matching profile, `--server` plus `--token` or `--demo` is
/// enough on its own.
pub fn build_dashboard_config(global: &GlobalOpts) -> Result<DashboardConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let base = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.server.is_some() => Profile::default(),
        // An explicitly requested profile that doesn't exist is an error.
        None if global.profile.is_some() => {
            let available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };
    let profile = apply_flags(base, global);

    let auth = if profile.demo {
        AuthCredentials::Demo
    } else if let Some(ref token) = global.token {
        AuthCredentials::SessionToken(SecretString::from(token.clone()))
    } else {
        homedash_config::resolve_auth(&profile, &profile_name)?
    };

    Ok(homedash_config::build_dashboard_config(
        &profile,
        &cfg.defaults,
        auth,
    )?)
}
