// ── Desired (optimistic) state ──

use serde::{Deserialize, Serialize};

use super::snapshot::{Light, Room, Zone};

/// Entities a client can switch and dim.
pub trait Switchable {
    fn is_on(&self) -> bool;
    fn set_on(&mut self, on: bool);
    fn brightness(&self) -> Option<u8>;
    fn set_brightness(&mut self, brightness: u8);

    /// Groups have no color temperature of their own.
    fn color_temp(&self) -> Option<u16> {
        None
    }

    fn set_color_temp(&mut self, _color_temp: u16) {}
}

impl Switchable for Light {
    fn is_on(&self) -> bool {
        self.on
    }

    fn set_on(&mut self, on: bool) {
        self.on = on;
    }

    fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = Some(brightness);
    }

    fn color_temp(&self) -> Option<u16> {
        self.color_temp
    }

    fn set_color_temp(&mut self, color_temp: u16) {
        self.color_temp = Some(color_temp);
    }
}

impl Switchable for Room {
    fn is_on(&self) -> bool {
        self.any_on
    }

    fn set_on(&mut self, on: bool) {
        self.any_on = on;
    }

    fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = Some(brightness);
    }
}

impl Switchable for Zone {
    fn is_on(&self) -> bool {
        self.any_on
    }

    fn set_on(&mut self, on: bool) {
        self.any_on = on;
    }

    fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = Some(brightness);
    }
}

/// The partial state a client has asked an entity to take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
}

impl DesiredState {
    pub fn power(on: bool) -> Self {
        Self {
            on: Some(on),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on.is_none() && self.brightness.is_none() && self.color_temp.is_none()
    }

    /// True when every specified field equals the entity's value.
    pub fn matches<S: Switchable + ?Sized>(&self, entity: &S) -> bool {
        self.on.is_none_or(|on| entity.is_on() == on)
            && self
                .brightness
                .is_none_or(|b| entity.brightness() == Some(b))
            && self
                .color_temp
                .is_none_or(|ct| entity.color_temp() == Some(ct))
    }

    /// Write every specified field onto the entity.
    pub fn overlay<S: Switchable + ?Sized>(&self, entity: &mut S) {
        if let Some(on) = self.on {
            entity.set_on(on);
        }
        if let Some(brightness) = self.brightness {
            entity.set_brightness(brightness);
        }
        if let Some(color_temp) = self.color_temp {
            entity.set_color_temp(color_temp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lamp() -> Light {
        Light {
            id: "l1".into(),
            name: "Lamp".into(),
            on: false,
            brightness: Some(30),
            color_temp: Some(2700),
            reachable: true,
        }
    }

    #[test]
    fn matches_compares_every_specified_field() {
        let mut light = lamp();
        light.on = true;

        let desired = DesiredState {
            on: Some(true),
            brightness: Some(80),
            color_temp: None,
        };
        // `on` agrees but brightness does not.
        assert!(!desired.matches(&light));

        light.brightness = Some(80);
        assert!(desired.matches(&light));
    }

    #[test]
    fn empty_desired_matches_anything() {
        assert!(DesiredState::default().matches(&lamp()));
        assert!(DesiredState::default().is_empty());
    }

    #[test]
    fn overlay_writes_only_specified_fields() {
        let mut light = lamp();
        DesiredState {
            on: Some(true),
            brightness: None,
            color_temp: Some(4000),
        }
        .overlay(&mut light);

        assert!(light.on);
        assert_eq!(light.brightness, Some(30));
        assert_eq!(light.color_temp, Some(4000));
    }

    #[test]
    fn groups_never_match_color_temperature() {
        let mut room = Room {
            id: "r1".into(),
            any_on: true,
            ..Room::default()
        };
        let desired = DesiredState {
            on: Some(true),
            color_temp: Some(3000),
            ..DesiredState::default()
        };
        desired.overlay(&mut room);
        assert!(room.any_on);
        assert!(!desired.matches(&room));
        assert!(DesiredState::power(true).matches(&room));
    }
}
