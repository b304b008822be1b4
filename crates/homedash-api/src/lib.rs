// homedash-api: wire protocol, push connection manager and write client for the homedash state service

pub mod client;
pub mod connection;
pub mod error;
pub mod models;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use client::{ApiMode, CommandClient};
pub use connection::{ConnectionState, ConnectionStatus, Credentials, ReconnectConfig};
pub use error::Error;
pub use protocol::{InboundMessage, OutboundMessage, RawChange};
pub use websocket::ConnectionManager;
