//! Power level for light control.

use serde::{Deserialize, Serialize};

/// Power state for a bulb.
///
/// The wire carries a `u16`; anything other than zero means the bulb is on.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PowerLevel {
    /// Turn the light on
    On,
    /// Turn the light off
    Off,
}

impl PowerLevel {
    /// The on/off flag value written into SetPowerState.
    pub fn level(&self) -> u16 {
        match self {
            PowerLevel::On => 1,
            PowerLevel::Off => 0,
        }
    }
}

impl From<u16> for PowerLevel {
    fn from(level: u16) -> Self {
        if level == 0 {
            PowerLevel::Off
        } else {
            PowerLevel::On
        }
    }
}
