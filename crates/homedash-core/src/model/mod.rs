// ── Domain model ──
//
// Typed view of the state service's data. Wire decoding lives in
// `crate::convert`; these types only describe shape and lookups.

pub mod desired;
pub mod entity;
pub mod snapshot;

// ── Re-exports ──────────────────────────────────────────────────────

pub use desired::{DesiredState, Switchable};
pub use entity::{EntityKey, EntityKind};
pub use snapshot::{Light, MotionZone, Room, Scene, Snapshot, Summary, Zone};
