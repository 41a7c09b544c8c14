//! Hue/saturation/brightness/kelvin colour.

use serde::{Deserialize, Serialize};

/// A colour in the bulb's native HSBK space.
///
/// Every component uses the full `u16` range: `hue` 0..=65535 maps onto
/// 0..360 degrees, `saturation` and `brightness` onto 0..100 percent.
/// `kelvin` only matters when saturation is zero.
///
/// # Examples
///
/// ```
/// use lifx_lan_rs::Colour;
///
/// let purple = Colour::new(0xcc15, 0xffff, 0x1f4, 0);
/// assert_eq!(purple.hue, 0xcc15);
///
/// let white = Colour::white(0x8000, 0x0af0);
/// assert_eq!(white.saturation, 0);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colour {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

impl Colour {
    pub const fn new(hue: u16, saturation: u16, brightness: u16, kelvin: u16) -> Self {
        Colour {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }

    /// Unsaturated white at the given brightness and colour temperature.
    pub const fn white(brightness: u16, kelvin: u16) -> Self {
        Colour::new(0, 0, brightness, kelvin)
    }
}
