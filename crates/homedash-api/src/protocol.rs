//! Push-channel wire protocol.
//!
//! Every frame on the websocket is a JSON object tagged by `type`. The
//! payloads are kept loosely typed here (`serde_json::Value`); typed domain
//! decoding happens in `homedash-core`, which can skip individual bad
//! records without dropping a whole batch.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::connection::Credentials;
use crate::error::Error;

// ── Inbound (server → client) ────────────────────────────────────────

/// A parsed frame from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Full state; replaces whatever the client holds.
    InitialState { data: serde_json::Value },

    /// Ordered batch of change records, applied atomically.
    StateUpdate {
        #[serde(default)]
        changes: Vec<RawChange>,
    },

    /// Non-fatal server-side error. Does not close the connection.
    Error {
        #[serde(default)]
        message: String,
    },

    /// Heartbeat acknowledgment.
    Pong {},
}

impl InboundMessage {
    /// Wire name of the message type, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InitialState { .. } => "initial_state",
            Self::StateUpdate { .. } => "state_update",
            Self::Error { .. } => "error",
            Self::Pong {} => "pong",
        }
    }
}

/// One untyped change record, exactly as the server sent it.
///
/// `kind` defaults to an empty string so a record without one is skipped
/// downstream instead of failing the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChange {
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Parse one text frame.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, Error> {
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })
}

// ── Outbound (client → server) ───────────────────────────────────────

/// Frames the client sends on the push channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// First frame on every new connection.
    #[serde(rename_all = "camelCase")]
    Auth {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        demo_mode: Option<bool>,
    },

    /// Keepalive request.
    Ping,
}

impl OutboundMessage {
    /// Build the auth frame for the given credentials.
    pub fn auth(credentials: &Credentials) -> Self {
        match credentials {
            Credentials::Session(token) => Self::Auth {
                session_token: Some(token.expose_secret().to_owned()),
                demo_mode: None,
            },
            Credentials::Demo => Self::Auth {
                session_token: None,
                demo_mode: Some(true),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })
    }
}
