// ── Runtime connection configuration ──
//
// These types describe *how* to talk to the state service. They carry
// credential data and tuning, but never touch disk. The CLI builds a
// `DashboardConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use homedash_api::connection::HEARTBEAT_INTERVAL;
use homedash_api::transport::{TlsMode, TransportConfig};
use homedash_api::{ApiMode, Credentials, ReconnectConfig};

use crate::store::OPTIMISTIC_TTL;

/// How the client authenticates, on both channels.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Live mode with a server-issued session token.
    SessionToken(SecretString),
    /// Demo mode; no token needed.
    Demo,
}

impl AuthCredentials {
    pub(crate) fn push_credentials(&self) -> Credentials {
        match self {
            Self::SessionToken(token) => Credentials::Session(token.clone()),
            Self::Demo => Credentials::Demo,
        }
    }

    pub(crate) fn api_mode(&self) -> ApiMode {
        match self {
            Self::SessionToken(token) => ApiMode::Live(token.clone()),
            Self::Demo => ApiMode::Demo,
        }
    }
}

/// TLS verification strategy for the write channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed home servers).
    DangerAcceptInvalid,
}

/// Everything a [`Dashboard`](crate::Dashboard) needs to run.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Push channel endpoint, e.g. `wss://home.local/ws`.
    pub server: Url,
    /// Base URL of the write endpoints, e.g. `https://home.local`.
    pub api: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub heartbeat_interval: Duration,
    /// How long an unconfirmed write stays overlaid.
    pub optimistic_ttl: Duration,
}

impl DashboardConfig {
    /// Config with default tuning.
    pub fn new(server: Url, api: Url, auth: AuthCredentials) -> Self {
        Self {
            server,
            api,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            optimistic_ttl: OPTIMISTIC_TTL,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}
