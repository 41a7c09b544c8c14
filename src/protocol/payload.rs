//! Fixed-layout payload structures, one per opcode that carries data.

use std::io::{self, Read, Write};
use std::time::Duration;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use super::header::read_octets;
use crate::types::{Colour, Label, PowerLevel};

/// Encoding and decoding of a payload's fixed layout.
pub(crate) trait WirePayload: Sized {
    /// Bytes occupied on the wire.
    const LEN: usize;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()>;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self>;
}

/// Gateway announcement (0x03).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanGateway {
    pub service: u8,
    pub port: u16,
}

impl PanGateway {
    pub const LEN: usize = 3;
}

impl WirePayload for PanGateway {
    const LEN: usize = PanGateway::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.service)?;
        w.write_u16::<LittleEndian>(self.port)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(PanGateway {
            service: r.read_u8()?,
            port: r.read_u16::<LittleEndian>()?,
        })
    }
}

/// Power change request (0x15).
///
/// The flag goes out big-endian, unlike every other field in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPowerState {
    pub on_off: u16,
}

impl SetPowerState {
    pub const LEN: usize = 2;

    pub fn new(power: PowerLevel) -> Self {
        SetPowerState {
            on_off: power.level(),
        }
    }
}

impl WirePayload for SetPowerState {
    const LEN: usize = SetPowerState::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<BigEndian>(self.on_off)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(SetPowerState {
            on_off: r.read_u16::<BigEndian>()?,
        })
    }
}

/// Power report (0x16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerState {
    pub on_off: u16,
}

impl PowerState {
    pub const LEN: usize = 2;
}

impl WirePayload for PowerState {
    const LEN: usize = PowerState::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.on_off)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(PowerState {
            on_off: r.read_u16::<LittleEndian>()?,
        })
    }
}

/// Tag bitmask report (0x1c).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tags {
    pub tags: u64,
}

impl Tags {
    pub const LEN: usize = 8;
}

impl WirePayload for Tags {
    const LEN: usize = Tags::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.tags)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Tags {
            tags: r.read_u64::<LittleEndian>()?,
        })
    }
}

/// Request for the labels of a tag bitmask (0x1d).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetTagLabels {
    pub tags: u64,
}

impl GetTagLabels {
    pub const LEN: usize = 8;
}

impl WirePayload for GetTagLabels {
    const LEN: usize = GetTagLabels::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.tags)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(GetTagLabels {
            tags: r.read_u64::<LittleEndian>()?,
        })
    }
}

/// Tag label report (0x1f).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLabels {
    pub tags: u64,
    pub label: Label,
}

impl TagLabels {
    pub const LEN: usize = 8 + Label::LEN;
}

impl WirePayload for TagLabels {
    const LEN: usize = TagLabels::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.tags)?;
        w.write_all(self.label.as_bytes())
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(TagLabels {
            tags: r.read_u64::<LittleEndian>()?,
            label: Label::from_bytes(read_octets(r)?),
        })
    }
}

/// Colour change request (0x66).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLightColour {
    pub stream: u8,
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
    /// Transition time in milliseconds
    pub duration_ms: u32,
}

impl SetLightColour {
    pub const LEN: usize = 13;

    /// Transition to `colour` over `duration` (saturating at `u32::MAX` ms).
    pub fn new(colour: Colour, duration: Duration) -> Self {
        SetLightColour {
            stream: 0,
            hue: colour.hue,
            saturation: colour.saturation,
            brightness: colour.brightness,
            kelvin: colour.kelvin,
            duration_ms: u32::try_from(duration.as_millis()).unwrap_or(u32::MAX),
        }
    }

    pub fn colour(&self) -> Colour {
        Colour::new(self.hue, self.saturation, self.brightness, self.kelvin)
    }
}

impl WirePayload for SetLightColour {
    const LEN: usize = SetLightColour::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.stream)?;
        w.write_u16::<LittleEndian>(self.hue)?;
        w.write_u16::<LittleEndian>(self.saturation)?;
        w.write_u16::<LittleEndian>(self.brightness)?;
        w.write_u16::<LittleEndian>(self.kelvin)?;
        w.write_u32::<LittleEndian>(self.duration_ms)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(SetLightColour {
            stream: r.read_u8()?,
            hue: r.read_u16::<LittleEndian>()?,
            saturation: r.read_u16::<LittleEndian>()?,
            brightness: r.read_u16::<LittleEndian>()?,
            kelvin: r.read_u16::<LittleEndian>()?,
            duration_ms: r.read_u32::<LittleEndian>()?,
        })
    }
}

/// Full bulb status report (0x6b).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
    pub dim: u16,
    pub power: u16,
    pub label: Label,
    pub tags: u64,
}

impl LightState {
    pub const LEN: usize = 6 * 2 + Label::LEN + 8;
}

impl WirePayload for LightState {
    const LEN: usize = LightState::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for field in [
            self.hue,
            self.saturation,
            self.brightness,
            self.kelvin,
            self.dim,
            self.power,
        ] {
            w.write_u16::<LittleEndian>(field)?;
        }
        w.write_all(self.label.as_bytes())?;
        w.write_u64::<LittleEndian>(self.tags)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(LightState {
            hue: r.read_u16::<LittleEndian>()?,
            saturation: r.read_u16::<LittleEndian>()?,
            brightness: r.read_u16::<LittleEndian>()?,
            kelvin: r.read_u16::<LittleEndian>()?,
            dim: r.read_u16::<LittleEndian>()?,
            power: r.read_u16::<LittleEndian>()?,
            label: Label::from_bytes(read_octets(r)?),
            tags: r.read_u64::<LittleEndian>()?,
        })
    }
}

/// Ambient light sensor report (0x192).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLightState {
    pub lux: f32,
}

impl AmbientLightState {
    pub const LEN: usize = 4;
}

impl WirePayload for AmbientLightState {
    const LEN: usize = AmbientLightState::LEN;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_f32::<LittleEndian>(self.lux)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(AmbientLightState {
            lux: r.read_f32::<LittleEndian>()?,
        })
    }
}
