// ── Home state snapshot ──
//
// The complete picture of the home as last published by the server.
// Snapshots are immutable once shared (`Arc<Snapshot>`); every accepted
// update produces a fresh value.

use chrono::{DateTime, Utc};
use homedash_api::models::deserialize_percent;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub summary: Summary,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub motion_zones: Vec<MotionZone>,
}

/// Aggregate counters plus whatever else the server attaches (heating,
/// hot water and other appliance status). The extra fields are carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub total_lights: u32,
    #[serde(default)]
    pub lights_on: u32,
    #[serde(default)]
    pub rooms_active: u32,
    #[serde(default)]
    pub motion_active: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub any_on: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub brightness: Option<u8>,
    #[serde(default)]
    pub lights: Vec<Light>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub on: bool,
    /// 0-100
    #[serde(
        default,
        deserialize_with = "deserialize_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub brightness: Option<u8>,
    /// Kelvin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
    #[serde(default = "default_true")]
    pub reachable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub any_on: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub brightness: Option<u8>,
    #[serde(default)]
    pub light_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionZone {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub motion: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
}

// ── Lookups ──────────────────────────────────────────────────────────

impl Snapshot {
    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Find a light anywhere in the snapshot, with the room that holds it.
    pub fn light(&self, id: &str) -> Option<(&Room, &Light)> {
        self.rooms
            .iter()
            .find_map(|room| room.light(id).map(|light| (room, light)))
    }

    pub(crate) fn light_mut(&mut self, id: &str) -> Option<&mut Light> {
        self.rooms
            .iter_mut()
            .find_map(|room| room.lights.iter_mut().find(|l| l.id == id))
    }

    /// Find a scene in any room.
    pub fn scene(&self, id: &str) -> Option<(&Room, &Scene)> {
        self.rooms.iter().find_map(|room| {
            room.scenes
                .iter()
                .find(|s| s.id == id)
                .map(|scene| (room, scene))
        })
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.rooms.iter().flat_map(|r| r.lights.iter())
    }
}

impl Room {
    pub fn light(&self, id: &str) -> Option<&Light> {
        self.lights.iter().find(|l| l.id == id)
    }

    pub fn lights_on(&self) -> usize {
        self.lights.iter().filter(|l| l.on).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn snapshot_from_wire_json() {
        let raw = json!({
            "summary": { "totalLights": 2, "lightsOn": 1, "heating": { "mode": "auto", "target": 20.5 } },
            "rooms": [{
                "id": "r1", "name": "Living", "anyOn": true, "brightness": 80,
                "lights": [
                    { "id": "l1", "name": "Lamp", "on": true, "brightness": 80, "colorTemp": 2700 },
                    { "id": "l2", "name": "Strip", "on": false, "reachable": false }
                ],
                "scenes": [{ "id": "s1", "name": "Relax" }]
            }],
            "zones": [{ "id": "z1", "name": "Downstairs", "anyOn": true, "lightIds": ["l1", "l2"] }],
            "motionZones": [{ "id": "m1", "name": "Hall", "motion": true, "lastTriggered": "2026-01-02T03:04:05Z" }]
        });

        let snapshot: Snapshot = serde_json::from_value(raw).unwrap();

        assert_eq!(snapshot.summary.lights_on, 1);
        assert_eq!(snapshot.summary.extra["heating"]["mode"], "auto");
        let (room, lamp) = snapshot.light("l1").unwrap();
        assert_eq!(room.id, "r1");
        assert_eq!(lamp.color_temp, Some(2700));
        assert!(lamp.reachable);
        assert!(!snapshot.light("l2").unwrap().1.reachable);
        assert_eq!(snapshot.zone("z1").unwrap().light_ids, vec!["l1", "l2"]);
        let hall = &snapshot.motion_zones[0];
        assert!(hall.enabled);
        assert!(hall.last_triggered.is_some());
        assert_eq!(snapshot.scene("s1").unwrap().0.id, "r1");
    }

    #[test]
    fn fractional_brightness_is_rounded() {
        let raw = json!({
            "rooms": [{
                "id": "r1", "brightness": 54.3,
                "lights": [{ "id": "l1", "on": true, "brightness": 99.6 }]
            }],
            "zones": [{ "id": "z1", "brightness": 120 }]
        });

        let snapshot: Snapshot = serde_json::from_value(raw).unwrap();

        assert_eq!(snapshot.rooms[0].brightness, Some(54));
        assert_eq!(snapshot.light("l1").unwrap().1.brightness, Some(100));
        assert_eq!(snapshot.zone("z1").unwrap().brightness, Some(100));
    }

    #[test]
    fn summary_pass_through_survives_round_trip() {
        let raw = json!({ "totalLights": 4, "hotWater": { "boost": true } });
        let summary: Summary = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&summary).unwrap();
        assert_eq!(back["hotWater"]["boost"], true);
        assert_eq!(back["totalLights"], 4);
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_value(json!({})).unwrap();
        assert!(snapshot.rooms.is_empty());
        assert!(snapshot.motion_zones.is_empty());
        assert_eq!(snapshot.lights().count(), 0);
    }
}
