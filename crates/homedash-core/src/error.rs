// ── Core error types ──
//
// User-facing errors from homedash-core. Consumers never see raw HTTP or
// websocket failures; the `From<homedash_api::Error>` impl translates
// transport-layer errors into domain variants.

use thiserror::Error;

use crate::model::EntityKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the state service at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("No {kind} with id {id:?}")]
    NotFound { kind: EntityKind, id: String },

    #[error("No state received from the server yet")]
    NoSnapshot,

    // ── Write errors ─────────────────────────────────────────────────
    #[error("Write rejected by server (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// True for failures that may succeed if simply tried again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::WriteFailed { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homedash_api::Error> for CoreError {
    fn from(err: homedash_api::Error) -> Self {
        match err {
            homedash_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::WriteFailed {
                        message: e.to_string(),
                    }
                }
            }
            homedash_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            homedash_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            homedash_api::Error::Rejected { status, message } => {
                CoreError::Rejected { status, message }
            }
            homedash_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            homedash_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            homedash_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            homedash_api::Error::HeartbeatTimeout { silent_secs } => CoreError::Timeout {
                timeout_secs: silent_secs,
            },
            homedash_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
