//! Typed commands and the opcode dispatcher.

use std::io::Cursor;

use log::trace;

use super::payload::WirePayload;
use super::{
    AmbientLightState, GetTagLabels, LightState, Opcode, PacketHeader, PanGateway, PowerState,
    SetLightColour, SetPowerState, TagLabels, Tags,
};
use crate::errors::Error;
use crate::types::{DeviceAddress, SiteId};

type Result<T> = std::result::Result<T, Error>;

/// Payload of a command, tagged by opcode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    GetPanGateway,
    PanGateway(PanGateway),
    GetPowerState,
    SetPowerState(SetPowerState),
    PowerState(PowerState),
    GetTags,
    Tags(Tags),
    GetTagLabels(GetTagLabels),
    TagLabels(TagLabels),
    GetLightState,
    SetLightColour(SetLightColour),
    LightState(LightState),
    GetAmbientLight,
    AmbientLightState(AmbientLightState),
}

impl Payload {
    pub fn opcode(&self) -> Opcode {
        match self {
            Payload::GetPanGateway => Opcode::GetPanGateway,
            Payload::PanGateway(_) => Opcode::PanGateway,
            Payload::GetPowerState => Opcode::GetPowerState,
            Payload::SetPowerState(_) => Opcode::SetPowerState,
            Payload::PowerState(_) => Opcode::PowerState,
            Payload::GetTags => Opcode::GetTags,
            Payload::Tags(_) => Opcode::Tags,
            Payload::GetTagLabels(_) => Opcode::GetTagLabels,
            Payload::TagLabels(_) => Opcode::TagLabels,
            Payload::GetLightState => Opcode::GetLightState,
            Payload::SetLightColour(_) => Opcode::SetLightColour,
            Payload::LightState(_) => Opcode::LightState,
            Payload::GetAmbientLight => Opcode::GetAmbientLight,
            Payload::AmbientLightState(_) => Opcode::AmbientLightState,
        }
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> std::io::Result<()> {
        match self {
            Payload::GetPanGateway
            | Payload::GetPowerState
            | Payload::GetTags
            | Payload::GetLightState
            | Payload::GetAmbientLight => Ok(()),
            Payload::PanGateway(p) => p.write_to(buf),
            Payload::SetPowerState(p) => p.write_to(buf),
            Payload::PowerState(p) => p.write_to(buf),
            Payload::Tags(p) => p.write_to(buf),
            Payload::GetTagLabels(p) => p.write_to(buf),
            Payload::TagLabels(p) => p.write_to(buf),
            Payload::SetLightColour(p) => p.write_to(buf),
            Payload::LightState(p) => p.write_to(buf),
            Payload::AmbientLightState(p) => p.write_to(buf),
        }
    }

    /// Decode the payload for `opcode` from the bytes following the header.
    fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        let payload = match opcode {
            Opcode::GetPanGateway => Payload::GetPanGateway,
            Opcode::PanGateway => Payload::PanGateway(read(opcode, bytes)?),
            Opcode::GetPowerState => Payload::GetPowerState,
            Opcode::SetPowerState => Payload::SetPowerState(read(opcode, bytes)?),
            Opcode::PowerState => Payload::PowerState(read(opcode, bytes)?),
            Opcode::GetTags => Payload::GetTags,
            Opcode::Tags => Payload::Tags(read(opcode, bytes)?),
            Opcode::GetTagLabels => Payload::GetTagLabels(read(opcode, bytes)?),
            Opcode::TagLabels => Payload::TagLabels(read(opcode, bytes)?),
            Opcode::GetLightState => Payload::GetLightState,
            Opcode::SetLightColour => Payload::SetLightColour(read(opcode, bytes)?),
            Opcode::LightState => Payload::LightState(read(opcode, bytes)?),
            Opcode::GetAmbientLight => Payload::GetAmbientLight,
            Opcode::AmbientLightState => Payload::AmbientLightState(read(opcode, bytes)?),
        };
        Ok(payload)
    }
}

/// Read a fixed layout, ignoring any trailing bytes the device appended.
fn read<P: WirePayload>(opcode: Opcode, bytes: &[u8]) -> Result<P> {
    let malformed = || Error::MalformedPayload {
        opcode,
        expected: P::LEN,
        actual: bytes.len(),
    };

    if bytes.len() < P::LEN {
        return Err(malformed());
    }
    P::read_from(&mut Cursor::new(bytes)).map_err(|_| malformed())
}

/// A header plus its typed payload.
///
/// # Examples
///
/// ```
/// use lifx_lan_rs::protocol::{Command, Opcode, Payload};
///
/// let cmd = Command::new(Payload::GetLightState);
/// let bytes = cmd.encode().unwrap();
/// assert_eq!(bytes.len(), 36);
///
/// let decoded = Command::decode(&bytes).unwrap();
/// assert_eq!(decoded.opcode(), Opcode::GetLightState);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub header: PacketHeader,
    pub payload: Payload,
}

impl Command {
    /// A command with zeroed addressing: every device, no site.
    pub fn new(payload: Payload) -> Self {
        Command {
            header: PacketHeader::new(payload.opcode()),
            payload,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.payload.opcode()
    }

    pub fn site(&self) -> SiteId {
        self.header.site
    }

    pub fn target(&self) -> DeviceAddress {
        self.header.target
    }

    /// Retarget the command at another gateway's mesh.
    pub fn set_site(&mut self, site: SiteId) {
        self.header.site = site;
    }

    /// Address the command at a single device; zero means every device on the site.
    pub fn set_target(&mut self, target: DeviceAddress) {
        self.header.target = target;
    }

    /// Builder-style variant of [`Command::set_site`].
    pub fn with_site(mut self, site: SiteId) -> Self {
        self.set_site(site);
        self
    }

    /// Builder-style variant of [`Command::set_target`].
    pub fn with_target(mut self, target: DeviceAddress) -> Self {
        self.set_target(target);
        self
    }

    /// Serialize header and payload.
    ///
    /// `size` and `packet_type` are always written from the payload, so the
    /// result is self-consistent even if the header was edited by hand.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let opcode = self.opcode();
        let size = PacketHeader::LEN + opcode.payload_len();

        let header = PacketHeader {
            size: size as u16,
            packet_type: opcode.code(),
            ..self.header
        };

        let mut buf = Vec::with_capacity(size);
        header.encode_into(&mut buf).map_err(Error::Encode)?;
        self.payload.write_to(&mut buf).map_err(Error::Encode)?;
        Ok(buf)
    }

    /// Decode a complete datagram.
    ///
    /// Fails with [`Error::UnknownOpcode`] for packet types outside the
    /// supported set; callers are expected to skip such datagrams.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = PacketHeader::decode(buf)?;
        let opcode = header
            .opcode()
            .ok_or(Error::UnknownOpcode(header.packet_type))?;

        let payload = Payload::decode(opcode, &buf[PacketHeader::LEN..])?;
        trace!("decoded {opcode} for {} on site {}", header.target, header.site);

        Ok(Command { header, payload })
    }
}
