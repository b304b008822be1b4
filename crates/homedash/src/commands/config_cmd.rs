//! Config subcommand handlers. None of these touch the server.

use std::fmt::Write as _;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

/// Copy of the config with plaintext secrets masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.session_token.is_some() {
            profile.session_token = Some(REDACTED.into());
        }
    }
    cfg
}

/// TOML-like rendering for the table format.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = write!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out, "\n");
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = write!(out, "server = \"{}\"", p.server);
        if let Some(ref api) = p.api {
            let _ = write!(out, "\napi = \"{api}\"");
        }
        if p.demo {
            let _ = write!(out, "\ndemo = true");
        }
        if let Some(ref token) = p.session_token {
            let _ = write!(out, "\nsession_token = \"{token}\"");
        }
        if let Some(ref env) = p.session_token_env {
            let _ = write!(out, "\nsession_token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = write!(out, "\nca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = write!(out, "\ninsecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = write!(out, "\ntimeout = {timeout}");
        }
    }

    out
}

fn format_profiles(cfg: &Config) -> String {
    let default = cfg.default_profile.as_deref().unwrap_or("default");
    cfg.profiles
        .keys()
        .map(|name| {
            if name == default {
                format!("{name} *")
            } else {
                name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config()?);
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            if cfg.profiles.is_empty() {
                eprintln!(
                    "No profiles configured. Add one to {}",
                    config::config_path().display()
                );
                return Ok(());
            }
            output::print_output(&format_profiles(&cfg), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Profile;

    fn sample() -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                server: "wss://home.local/ws".into(),
                session_token: Some("hunter2".into()),
                ..Profile::default()
            },
        );
        cfg.profiles.insert(
            "cabin".into(),
            Profile {
                server: "ws://cabin.lan:8080/ws".into(),
                demo: true,
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn redaction_masks_tokens_only() {
        let cfg = redacted(&sample());
        assert_eq!(
            cfg.profiles["default"].session_token.as_deref(),
            Some(REDACTED)
        );
        assert_eq!(cfg.profiles["cabin"].session_token, None);
        assert!(!format_config(&cfg).contains("hunter2"));
    }

    #[test]
    fn profiles_mark_the_default() {
        assert_eq!(format_profiles(&sample()), "cabin\ndefault *");
    }
}
