// Resolve a command against the confirmed snapshot and decide which
// optimistic entries it records before the request is sent.

use crate::error::CoreError;
use crate::model::{DesiredState, EntityKey, EntityKind, Snapshot};

use super::Command;

fn not_found(kind: EntityKind, id: &str) -> CoreError {
    CoreError::NotFound {
        kind,
        id: id.to_owned(),
    }
}

/// Entries to record for `command`, or `NotFound` if its target does not
/// exist in `snapshot`.
///
/// Group power writes cover every member light plus the group aggregate.
/// Scenes record nothing up front; their effect comes back in the response.
pub(crate) fn plan(
    command: &Command,
    snapshot: &Snapshot,
) -> Result<Vec<(EntityKey, DesiredState)>, CoreError> {
    match command {
        Command::SetLight { light_id, desired } => {
            snapshot
                .light(light_id)
                .ok_or_else(|| not_found(EntityKind::Light, light_id))?;
            Ok(vec![(EntityKey::light(light_id.as_str()), *desired)])
        }
        Command::SetRoomPower { room_id, on } => {
            let room = snapshot
                .room(room_id)
                .ok_or_else(|| not_found(EntityKind::Room, room_id))?;
            let desired = DesiredState::power(*on);
            Ok(room
                .lights
                .iter()
                .map(|light| (EntityKey::light(light.id.as_str()), desired))
                .chain(std::iter::once((EntityKey::room(room_id.as_str()), desired)))
                .collect())
        }
        Command::SetZonePower { zone_id, on } => {
            let zone = snapshot
                .zone(zone_id)
                .ok_or_else(|| not_found(EntityKind::Zone, zone_id))?;
            let desired = DesiredState::power(*on);
            Ok(zone
                .light_ids
                .iter()
                .map(|id| (EntityKey::light(id.as_str()), desired))
                .chain(std::iter::once((EntityKey::zone(zone_id.as_str()), desired)))
                .collect())
        }
        Command::ActivateScene { scene_id } => {
            // Scenes are nested in rooms; report the room kind as the
            // closest addressable parent.
            snapshot
                .scene(scene_id)
                .ok_or_else(|| not_found(EntityKind::Room, scene_id))?;
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn snapshot() -> Snapshot {
        serde_json::from_value(json!({
            "rooms": [{
                "id": "r1", "name": "Living",
                "lights": [
                    { "id": "l1", "name": "Lamp", "on": false },
                    { "id": "l2", "name": "Strip", "on": true }
                ],
                "scenes": [{ "id": "s1", "name": "Movie" }]
            }],
            "zones": [{ "id": "z1", "name": "Downstairs", "lightIds": ["l1", "l2"] }]
        }))
        .unwrap()
    }

    #[test]
    fn light_write_records_the_light() {
        let command = Command::SetLight {
            light_id: "l1".into(),
            desired: DesiredState {
                brightness: Some(40),
                ..DesiredState::power(true)
            },
        };
        let entries = plan(&command, &snapshot()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, EntityKey::light("l1"));
        assert_eq!(entries[0].1.brightness, Some(40));
    }

    #[test]
    fn room_power_covers_members_and_aggregate() {
        let command = Command::SetRoomPower {
            room_id: "r1".into(),
            on: false,
        };
        let keys: Vec<_> = plan(&command, &snapshot())
            .unwrap()
            .into_iter()
            .map(|(key, desired)| {
                assert_eq!(desired, DesiredState::power(false));
                key
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                EntityKey::light("l1"),
                EntityKey::light("l2"),
                EntityKey::room("r1")
            ]
        );
    }

    #[test]
    fn zone_power_uses_listed_members() {
        let command = Command::SetZonePower {
            zone_id: "z1".into(),
            on: true,
        };
        let entries = plan(&command, &snapshot()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].0, EntityKey::zone("z1"));
    }

    #[test]
    fn scene_records_nothing_up_front() {
        let command = Command::ActivateScene {
            scene_id: "s1".into(),
        };
        assert!(plan(&command, &snapshot()).unwrap().is_empty());
    }

    #[test]
    fn unknown_targets_are_not_found() {
        let snapshot = snapshot();
        let cases = [
            (
                Command::SetLight {
                    light_id: "ghost".into(),
                    desired: DesiredState::power(true),
                },
                EntityKind::Light,
            ),
            (
                Command::SetRoomPower {
                    room_id: "ghost".into(),
                    on: true,
                },
                EntityKind::Room,
            ),
            (
                Command::SetZonePower {
                    zone_id: "ghost".into(),
                    on: true,
                },
                EntityKind::Zone,
            ),
        ];
        for (command, expected) in cases {
            match plan(&command, &snapshot).unwrap_err() {
                CoreError::NotFound { kind, id } => {
                    assert_eq!(kind, expected);
                    assert_eq!(id, "ghost");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
