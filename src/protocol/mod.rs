//! Wire format: the 36-byte packet header, per-opcode payloads, and the
//! dispatcher that turns a datagram into a typed [`Command`].
//!
//! Every packet is a little-endian header followed by a fixed-layout payload.
//! The header's `packet_type` selects the payload shape and `size` covers
//! header plus payload.

mod command;
mod header;
mod payload;

use strum_macros::{Display, EnumIter, FromRepr};

pub use command::{Command, Payload};
pub use header::PacketHeader;
pub use payload::{
    AmbientLightState, GetTagLabels, LightState, PanGateway, PowerState, SetLightColour,
    SetPowerState, TagLabels, Tags,
};

/// UDP port bulbs listen on and broadcast to.
pub const BROADCAST_PORT: u16 = 56700;

/// Protocol field used by the discovery request.
pub const DISCOVERY_PROTOCOL: u16 = 0x5400;

/// Protocol field used by every other packet the client originates.
pub const COMMAND_PROTOCOL: u16 = 0x3400;

/// PANGateway service value announcing the lighting service.
pub const SERVICE_UDP: u8 = 1;

/// Which side of the conversation originates a packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by this client
    Send,
    /// Sent by gateways and bulbs
    Receive,
}

/// Packet types understood by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[repr(u16)]
pub enum Opcode {
    GetPanGateway = 0x02,
    PanGateway = 0x03,
    GetPowerState = 0x14,
    SetPowerState = 0x15,
    PowerState = 0x16,
    GetTags = 0x1a,
    Tags = 0x1c,
    GetTagLabels = 0x1d,
    TagLabels = 0x1f,
    GetLightState = 0x65,
    SetLightColour = 0x66,
    LightState = 0x6b,
    GetAmbientLight = 0x191,
    AmbientLightState = 0x192,
}

impl Opcode {
    /// The numeric packet type.
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn direction(self) -> Direction {
        match self {
            Opcode::PanGateway
            | Opcode::PowerState
            | Opcode::Tags
            | Opcode::TagLabels
            | Opcode::LightState
            | Opcode::AmbientLightState => Direction::Receive,
            _ => Direction::Send,
        }
    }

    /// Length in bytes of the fixed payload layout for this packet type.
    pub fn payload_len(self) -> usize {
        match self {
            Opcode::GetPanGateway
            | Opcode::GetPowerState
            | Opcode::GetTags
            | Opcode::GetLightState
            | Opcode::GetAmbientLight => 0,
            Opcode::PanGateway => PanGateway::LEN,
            Opcode::SetPowerState => SetPowerState::LEN,
            Opcode::PowerState => PowerState::LEN,
            Opcode::Tags => Tags::LEN,
            Opcode::GetTagLabels => GetTagLabels::LEN,
            Opcode::TagLabels => TagLabels::LEN,
            Opcode::SetLightColour => SetLightColour::LEN,
            Opcode::LightState => LightState::LEN,
            Opcode::AmbientLightState => AmbientLightState::LEN,
        }
    }

    /// Value of the header's protocol field when this client originates the packet.
    pub fn protocol(self) -> u16 {
        match self {
            Opcode::GetPanGateway => DISCOVERY_PROTOCOL,
            _ => COMMAND_PROTOCOL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_codes_round_trip_through_from_repr() {
        for opcode in Opcode::iter() {
            assert_eq!(Opcode::from_repr(opcode.code()), Some(opcode));
        }
        assert_eq!(Opcode::from_repr(0x04), None);
    }

    #[test]
    fn test_codes_match_wire_table() {
        assert_eq!(Opcode::SetPowerState.code(), 0x15);
        assert_eq!(Opcode::LightState.code(), 0x6b);
        assert_eq!(Opcode::AmbientLightState.code(), 0x192);
    }

    #[test]
    fn test_queries_have_empty_payloads() {
        for opcode in Opcode::iter() {
            if opcode.direction() == Direction::Send && opcode.to_string().starts_with("Get") {
                let expect_empty = opcode != Opcode::GetTagLabels;
                assert_eq!(opcode.payload_len() == 0, expect_empty, "{opcode}");
            }
        }
    }
}
