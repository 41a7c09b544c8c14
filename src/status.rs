//! Bulb status snapshots.

use serde::{Deserialize, Serialize};

use crate::protocol::LightState;
use crate::types::{Colour, DeviceAddress, PowerLevel};

/// Last known settings of a bulb.
///
/// Snapshots are plain values: a change is detected by comparing every field,
/// and an update replaces the whole snapshot.
///
/// # Examples
///
/// ```
/// use lifx_lan_rs::BulbState;
///
/// let on = BulbState { power: 1, visible: true, ..Default::default() };
/// let off = on.with_power(0);
/// assert_ne!(on, off);
/// assert!(on.is_on());
/// assert!(!off.is_on());
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulbState {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
    pub dim: u16,
    pub power: u16,
    /// Whether the bulb has been heard from within the liveness window
    pub visible: bool,
}

impl BulbState {
    /// Get the colour part of the snapshot.
    pub fn colour(&self) -> Colour {
        Colour::new(self.hue, self.saturation, self.brightness, self.kelvin)
    }

    pub fn power_level(&self) -> PowerLevel {
        PowerLevel::from(self.power)
    }

    pub fn is_on(&self) -> bool {
        self.power != 0
    }

    /// Copy of this snapshot with only the power field replaced.
    pub fn with_power(self, power: u16) -> Self {
        BulbState { power, ..self }
    }

    pub(crate) fn with_visible(self, visible: bool) -> Self {
        BulbState { visible, ..self }
    }
}

impl From<&LightState> for BulbState {
    fn from(state: &LightState) -> Self {
        BulbState {
            hue: state.hue,
            saturation: state.saturation,
            brightness: state.brightness,
            kelvin: state.kelvin,
            dim: state.dim,
            power: state.power,
            visible: true,
        }
    }
}

/// An ambient light measurement reported by a bulb.
///
/// Readings are handed to subscribers as they arrive and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSensorReading {
    pub bulb: DeviceAddress,
    pub lux: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;

    #[test]
    fn test_from_light_state_is_visible() {
        let state = LightState {
            hue: 1,
            saturation: 2,
            brightness: 3,
            kelvin: 4,
            dim: 5,
            power: 6,
            label: Label::new("x"),
            tags: 0,
        };
        let snapshot = BulbState::from(&state);
        assert!(snapshot.visible);
        assert_eq!(snapshot.colour(), Colour::new(1, 2, 3, 4));
        assert_eq!(snapshot.power_level(), PowerLevel::On);
    }

    #[test]
    fn test_equality_is_by_value() {
        let a = BulbState {
            hue: 10,
            visible: true,
            ..Default::default()
        };
        let b = a;
        assert_eq!(a, b);
        assert_ne!(a, b.with_visible(false));
    }
}
