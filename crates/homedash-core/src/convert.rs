// ── Wire-to-domain conversions ──
//
// Bridges the loosely typed `homedash_api` protocol frames into reducer
// input. Decoding is per record: one bad record is logged and skipped
// while the rest of its batch still applies.

use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use homedash_api::models::{AffectedEntity, LightStatePayload};
use homedash_api::{InboundMessage, RawChange};

use crate::model::{DesiredState, EntityKey, EntityKind, Light, MotionZone, Room, Snapshot, Zone};
use crate::reducer::{ChangeRecord, Update};

/// Why a change record was skipped.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("unknown change kind {0:?}")]
    UnknownKind(String),

    #[error("{kind} change without an id")]
    MissingId { kind: EntityKind },

    #[error("light change without a parent room id")]
    MissingParent,

    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Turn a server message into reducer input. `error` and `pong` frames
/// carry no state and yield `None`, as does an undecodable full state.
pub fn update_from_message(message: &InboundMessage) -> Option<Update> {
    match message {
        InboundMessage::InitialState { data } => {
            match serde_json::from_value::<Snapshot>(data.clone()) {
                Ok(snapshot) => Some(Update::Replace(Arc::new(snapshot))),
                Err(e) => {
                    warn!(error = %e, "dropping malformed initial_state");
                    None
                }
            }
        }
        InboundMessage::StateUpdate { changes } => Some(Update::Changes(decode_changes(changes))),
        InboundMessage::Error { .. } | InboundMessage::Pong {} => None,
    }
}

/// Decode a batch, logging and skipping records that cannot be applied.
pub fn decode_changes(changes: &[RawChange]) -> Vec<ChangeRecord> {
    changes
        .iter()
        .filter_map(|raw| match decode_change(raw) {
            Ok(record) => Some(record),
            Err(reason) => {
                warn!(kind = %raw.kind, id = ?raw.id, %reason, "skipping change record");
                None
            }
        })
        .collect()
}

/// Decode one record. The record's `id` wins over any id inside `data`.
pub fn decode_change(raw: &RawChange) -> Result<ChangeRecord, SkipReason> {
    let kind =
        EntityKind::from_str(&raw.kind).map_err(|_| SkipReason::UnknownKind(raw.kind.clone()))?;

    match kind {
        EntityKind::Summary => Ok(ChangeRecord::Summary(decode(kind, raw)?)),
        EntityKind::Room => {
            let mut room: Room = decode(kind, raw)?;
            room.id = record_id(kind, raw, room.id)?;
            Ok(ChangeRecord::Room(room))
        }
        EntityKind::Zone => {
            let mut zone: Zone = decode(kind, raw)?;
            zone.id = record_id(kind, raw, zone.id)?;
            Ok(ChangeRecord::Zone(zone))
        }
        EntityKind::MotionZone => {
            let mut motion: MotionZone = decode(kind, raw)?;
            motion.id = record_id(kind, raw, motion.id)?;
            Ok(ChangeRecord::MotionZone(motion))
        }
        EntityKind::Light => {
            let room_id = raw.parent_id.clone().ok_or(SkipReason::MissingParent)?;
            let mut light: Light = decode(kind, raw)?;
            light.id = record_id(kind, raw, light.id)?;
            Ok(ChangeRecord::Light { room_id, light })
        }
    }
}

fn decode<T: DeserializeOwned>(kind: EntityKind, raw: &RawChange) -> Result<T, SkipReason> {
    serde_json::from_value(raw.data.clone()).map_err(|source| SkipReason::Malformed { kind, source })
}

fn record_id(kind: EntityKind, raw: &RawChange, from_data: String) -> Result<String, SkipReason> {
    match raw.id.as_deref() {
        Some(id) if !id.is_empty() => Ok(id.to_owned()),
        _ if !from_data.is_empty() => Ok(from_data),
        _ => Err(SkipReason::MissingId { kind }),
    }
}

// ── Write channel ────────────────────────────────────────────────────

impl From<LightStatePayload> for DesiredState {
    fn from(p: LightStatePayload) -> Self {
        Self {
            on: p.on,
            brightness: p.brightness,
            color_temp: p.color_temp,
        }
    }
}

impl From<DesiredState> for LightStatePayload {
    fn from(d: DesiredState) -> Self {
        Self {
            on: d.on,
            brightness: d.brightness,
            color_temp: d.color_temp,
        }
    }
}

/// Map an entity from a write response onto an overlay entry. Only
/// switchable kinds with at least one reported field qualify.
pub fn affected_entry(affected: &AffectedEntity) -> Option<(EntityKey, DesiredState)> {
    let kind = EntityKind::from_str(&affected.kind).ok()?;
    if !matches!(kind, EntityKind::Light | EntityKind::Room | EntityKind::Zone) {
        return None;
    }
    let desired = DesiredState::from(affected.state);
    if desired.is_empty() {
        return None;
    }
    Some((EntityKey::new(kind, affected.id.clone()), desired))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn raw(value: serde_json::Value) -> RawChange {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn record_id_overrides_data_id() {
        let record = decode_change(&raw(json!({
            "kind": "room", "id": "r1",
            "data": { "id": "stale", "name": "Living", "anyOn": true }
        })))
        .unwrap();
        let ChangeRecord::Room(room) = record else {
            panic!("expected room");
        };
        assert_eq!(room.id, "r1");
        assert!(room.any_on);
    }

    #[test]
    fn data_id_used_when_record_has_none() {
        let record = decode_change(&raw(json!({
            "kind": "zone", "data": { "id": "z1", "anyOn": false }
        })))
        .unwrap();
        assert!(matches!(record, ChangeRecord::Zone(z) if z.id == "z1"));
    }

    #[test]
    fn light_needs_parent() {
        let err = decode_change(&raw(json!({ "kind": "light", "id": "l1", "data": { "on": true } })))
            .unwrap_err();
        assert!(matches!(err, SkipReason::MissingParent));

        let record = decode_change(&raw(json!({
            "kind": "light", "parentId": "r1", "id": "l1", "data": { "on": true, "brightness": 55 }
        })))
        .unwrap();
        let ChangeRecord::Light { room_id, light } = record else {
            panic!("expected light");
        };
        assert_eq!(room_id, "r1");
        assert_eq!(light.id, "l1");
        assert_eq!(light.brightness, Some(55));
    }

    #[test]
    fn unknown_kinds_are_skipped_rest_applies() {
        let changes = vec![
            raw(json!({ "kind": "thermostat", "id": "t1", "data": {} })),
            raw(json!({ "kind": "summary", "data": { "lightsOn": 2 } })),
            raw(json!({ "kind": "room", "data": {} })),
            raw(json!({ "kind": "zone", "id": "z1", "data": { "anyOn": "yes" } })),
            raw(json!({ "kind": "motion_zone", "id": "m1", "data": { "motion": true } })),
        ];
        let records = decode_changes(&changes);
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[0], ChangeRecord::Summary(s) if s.lights_on == 2));
        assert!(matches!(&records[1], ChangeRecord::MotionZone(m) if m.motion && m.id == "m1"));
    }

    #[test]
    fn malformed_initial_state_is_dropped() {
        let msg = InboundMessage::InitialState {
            data: json!({ "rooms": "not a list" }),
        };
        assert!(update_from_message(&msg).is_none());
    }

    #[test]
    fn error_and_pong_carry_no_update() {
        assert!(update_from_message(&InboundMessage::Pong {}).is_none());
        assert!(
            update_from_message(&InboundMessage::Error {
                message: "boom".into()
            })
            .is_none()
        );
    }

    #[test]
    fn affected_entries_keep_switchable_kinds_only() {
        let light: AffectedEntity = serde_json::from_value(json!({
            "kind": "light", "id": "l1", "parentId": "r1", "on": true, "brightness": 10
        }))
        .unwrap();
        let (key, desired) = affected_entry(&light).unwrap();
        assert_eq!(key, EntityKey::light("l1"));
        assert_eq!(desired.brightness, Some(10));

        let motion: AffectedEntity =
            serde_json::from_value(json!({ "kind": "motion_zone", "id": "m1", "on": true }))
                .unwrap();
        assert!(affected_entry(&motion).is_none());

        let bare: AffectedEntity =
            serde_json::from_value(json!({ "kind": "room", "id": "r1" })).unwrap();
        assert!(affected_entry(&bare).is_none());
    }
}
