// homedash-core: State sync layer between homedash-api and consumers (CLI).

pub mod command;
pub mod config;
pub mod convert;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod reducer;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult, PendingWrite, WriteFuture};
pub use config::{AuthCredentials, DashboardConfig, TlsVerification};
pub use dashboard::Dashboard;
pub use error::CoreError;
pub use reducer::{ChangeRecord, Update};
pub use store::{DashboardView, OptimisticEntry, WriteId};
pub use stream::{ViewStream, ViewWatchStream};

// Connection types come from the transport crate unchanged.
pub use homedash_api::{ConnectionState, ConnectionStatus, InboundMessage, ReconnectConfig};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    DesiredState, EntityKey, EntityKind, Light, MotionZone, Room, Scene, Snapshot, Summary,
    Switchable, Zone,
};
