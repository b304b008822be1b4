//! Shared configuration for homedash clients.
//!
//! TOML profiles, session token resolution (env + keyring + plaintext),
//! and translation to `homedash_core::DashboardConfig`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
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

use homedash_core::{AuthCredentials, DashboardConfig, TlsVerification};

/// Keyring service name; entries are keyed `<profile>/session-token`.
pub const KEYRING_SERVICE: &str = "homedash";

/// Environment prefix merged over the config file. Nested keys use a
/// double underscore, e.g. `HOMEDASH_DEFAULTS__TIMEOUT`.
pub const ENV_PREFIX: &str = "HOMEDASH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no session token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found in config")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name.to_owned(), profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.to_owned(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named server profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Push channel URL (e.g., "wss://home.local/ws").
    pub server: String,

    /// Write endpoint base URL. Derived from `server` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    /// Connect in demo mode; no session token needed.
    #[serde(default)]
    pub demo: bool,

    /// Session token in plaintext. Prefer the keyring or an env var.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Environment variable name containing the session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token_env: Option<String>,

    /// Path to custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    /// Override timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "homedash", "homedash").map_or_else(
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
    p.push("homedash");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, merged with `HOMEDASH_` env vars. A missing
/// file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve a session token from the credential chain (no CLI flag step).
pub fn resolve_session_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's session_token_env → env var lookup
    if let Some(val) = profile
        .session_token_env
        .as_deref()
        .and_then(|env_name| std::env::var(env_name).ok())
    {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/session-token"))
        .ok()
        .and_then(|entry| entry.get_password().ok())
    {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.session_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve `AuthCredentials`: demo profiles need no token.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    if profile.demo {
        return Ok(AuthCredentials::Demo);
    }
    resolve_session_token(profile, profile_name).map(AuthCredentials::SessionToken)
}

// ── URL handling ────────────────────────────────────────────────────

/// Parse a push channel URL; only `ws` and `wss` are accepted.
pub fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("expected a ws:// or wss:// URL, got scheme '{other}'"),
        }),
    }
}

/// Write endpoint base for a push URL: same host and port, `ws` → `http`,
/// `wss` → `https`, path dropped.
pub fn derive_api_url(server: &Url) -> Result<Url, ConfigError> {
    let scheme = if server.scheme() == "wss" { "https" } else { "http" };
    let host = server.host_str().ok_or_else(|| ConfigError::Validation {
        field: "server".into(),
        reason: format!("URL has no host: {server}"),
    })?;
    let raw = match server.port() {
        Some(port) => format!("{scheme}://{host}:{port}/"),
        None => format!("{scheme}://{host}/"),
    };
    Url::parse(&raw).map_err(|e| ConfigError::Validation {
        field: "api".into(),
        reason: format!("cannot derive API URL from {server}: {e}"),
    })
}

/// Parse an explicit write endpoint URL.
pub fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: "api".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Build a `DashboardConfig` from a profile, without CLI flag overrides.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    let auth = resolve_auth(profile, profile_name)?;
    build_dashboard_config(profile, defaults, auth)
}

/// Build a `DashboardConfig` from a profile with already-resolved auth.
pub fn build_dashboard_config(
    profile: &Profile,
    defaults: &Defaults,
    auth: AuthCredentials,
) -> Result<DashboardConfig, ConfigError> {
    let server = parse_server_url(&profile.server)?;
    let api = match profile.api.as_deref() {
        Some(raw) => parse_api_url(raw)?,
        None => derive_api_url(&server)?,
    };

    let mut config = DashboardConfig::new(server, api, auth);
    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn demo_profile(server: &str) -> Profile {
        Profile {
            server: server.into(),
            demo: true,
            ..Profile::default()
        }
    }

    #[test]
    fn api_url_is_derived_from_server() {
        let server = parse_server_url("wss://home.local:8443/ws").unwrap();
        assert_eq!(derive_api_url(&server).unwrap().as_str(), "https://home.local:8443/");

        let server = parse_server_url("ws://10.0.0.5/socket").unwrap();
        assert_eq!(derive_api_url(&server).unwrap().as_str(), "http://10.0.0.5/");
    }

    #[test]
    fn http_server_url_is_rejected() {
        let err = parse_server_url("https://home.local").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "server"));
    }

    #[test]
    fn demo_profile_needs_no_token() {
        let cfg = profile_to_dashboard_config(
            &demo_profile("ws://home.local/ws"),
            "demo",
            &Defaults::default(),
        )
        .unwrap();
        assert!(matches!(cfg.auth, AuthCredentials::Demo));
        assert_eq!(cfg.api.as_str(), "http://home.local/");
        assert_eq!(cfg.tls, TlsVerification::SystemDefaults);
        assert_eq!(cfg.timeout, Duration::from_secs(10));
    }

    #[test]
    fn plaintext_token_is_last_resort() {
        let profile = Profile {
            server: "wss://home.local/ws".into(),
            session_token: Some("tok".into()),
            session_token_env: Some("HOMEDASH_TEST_TOKEN_THAT_IS_NEVER_SET".into()),
            ..Profile::default()
        };
        // Profile name chosen so no keyring entry can exist for it.
        let auth = resolve_auth(&profile, "plaintext-only-test-profile").unwrap();
        assert!(matches!(auth, AuthCredentials::SessionToken(_)));
    }

    #[test]
    fn profile_overrides_win_over_defaults() {
        let profile = Profile {
            api: Some("https://api.home.local/".into()),
            insecure: Some(true),
            timeout: Some(3),
            ..demo_profile("wss://home.local/ws")
        };
        let defaults = Defaults {
            timeout: 30,
            ..Defaults::default()
        };
        let cfg = profile_to_dashboard_config(&profile, "demo", &defaults).unwrap();
        assert_eq!(cfg.api.as_str(), "https://api.home.local/");
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(cfg.timeout, Duration::from_secs(3));
    }

    #[test]
    fn ca_cert_selects_custom_ca() {
        let profile = Profile {
            ca_cert: Some(PathBuf::from("/etc/homedash/ca.pem")),
            ..demo_profile("wss://home.local/ws")
        };
        let cfg = profile_to_dashboard_config(&profile, "demo", &Defaults::default()).unwrap();
        assert_eq!(
            cfg.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/homedash/ca.pem"))
        );
    }

    #[test]
    fn default_profile_lookup() {
        let mut config = Config::default();
        config
            .profiles
            .insert("default".into(), demo_profile("ws://home.local/ws"));

        let (name, _) = config.profile(None).unwrap();
        assert_eq!(name, "default");

        let err = config.profile(Some("cabin")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { ref profile } if profile == "cabin"));
    }

    // Loading reads HOMEDASH_ env vars, so every test that loads runs
    // inside a figment jail to serialize against env changes.

    #[test]
    fn save_then_load_preserves_profiles() {
        figment::Jail::expect_with(|jail| {
            let path = jail.directory().join("nested").join("config.toml");

            let mut config = Config::default();
            config
                .profiles
                .insert("home".into(), demo_profile("wss://home.local/ws"));
            config.default_profile = Some("home".into());
            save_config_to(&path, &config).unwrap();

            let loaded = load_config_from(&path).unwrap();
            assert_eq!(loaded, config);
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        figment::Jail::expect_with(|jail| {
            let loaded = load_config_from(&jail.directory().join("absent.toml")).unwrap();
            assert_eq!(loaded.defaults, Defaults::default());
            assert!(loaded.profiles.is_empty());
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "home"

                [profiles.home]
                server = "wss://home.local/ws"
                demo = true
                "#,
            )?;
            jail.set_env("HOMEDASH_DEFAULT_PROFILE", "cabin");
            jail.set_env("HOMEDASH_DEFAULTS__TIMEOUT", "42");

            let config = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(config.default_profile.as_deref(), Some("cabin"));
            assert_eq!(config.defaults.timeout, 42);
            assert!(config.profiles["home"].demo);
            Ok(())
        });
    }
}
