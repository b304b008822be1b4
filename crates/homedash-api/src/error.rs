use thiserror::Error;

/// Top-level error type for the `homedash-api` crate.
///
/// Covers every failure mode of both channels: the push websocket and the
/// HTTP write endpoints. `homedash-core` maps these into user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Write endpoints ─────────────────────────────────────────────
    /// The server answered a write with a non-success status.
    #[error("Write rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Session token missing or refused.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer or the stream ended.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// No liveness acknowledgment within the heartbeat window.
    #[error("Heartbeat timed out after {silent_secs}s without traffic")]
    HeartbeatTimeout { silent_secs: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. }
            | Self::HeartbeatTimeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the server refused the write itself.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Authentication { .. })
    }

    /// HTTP status of a refused write, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
