// ── Entity identity ──

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Closed set of entity kinds the server publishes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Summary,
    Room,
    Light,
    Zone,
    MotionZone,
}

/// `(kind, id)` address of one entity.
///
/// Lights are nested inside rooms on the wire, but light ids are unique
/// across a snapshot, so a light is keyed by its own id alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn light(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Light, id)
    }

    pub fn room(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Room, id)
    }

    pub fn zone(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Zone, id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
