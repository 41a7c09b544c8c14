//! The fixed 36-byte packet header.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::Opcode;
use crate::errors::Error;
use crate::types::{DeviceAddress, SiteId};

type Result<T> = std::result::Result<T, Error>;

/// Header preceding every packet.
///
/// A zero `target` addresses every device on `site`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Header plus payload length in bytes
    pub size: u16,
    pub protocol: u16,
    pub reserved1: u32,
    pub target: DeviceAddress,
    pub reserved2: u16,
    pub site: SiteId,
    pub reserved3: u16,
    pub timestamp: u64,
    pub packet_type: u16,
    pub reserved4: u16,
}

impl PacketHeader {
    pub const LEN: usize = 36;

    /// A header for a packet this client originates, with zeroed addressing.
    pub fn new(opcode: Opcode) -> Self {
        PacketHeader {
            size: (Self::LEN + opcode.payload_len()) as u16,
            protocol: opcode.protocol(),
            packet_type: opcode.code(),
            ..Default::default()
        }
    }

    /// Returns the opcode named by `packet_type`, if it is one we know.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_repr(self.packet_type)
    }

    /// Write exactly [`PacketHeader::LEN`] bytes.
    pub fn encode_into<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u16::<LittleEndian>(self.size)?;
        w.write_u16::<LittleEndian>(self.protocol)?;
        w.write_u32::<LittleEndian>(self.reserved1)?;
        w.write_all(&self.target.octets())?;
        w.write_u16::<LittleEndian>(self.reserved2)?;
        w.write_all(&self.site.octets())?;
        w.write_u16::<LittleEndian>(self.reserved3)?;
        w.write_u64::<LittleEndian>(self.timestamp)?;
        w.write_u16::<LittleEndian>(self.packet_type)?;
        w.write_u16::<LittleEndian>(self.reserved4)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::LEN);
        self.encode_into(&mut buf).map_err(Error::Encode)?;
        Ok(buf)
    }

    /// Decode the header of a complete datagram.
    ///
    /// `buf` must hold the whole packet: the declared `size` is checked
    /// against its length.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::LEN {
            return Err(Error::malformed_header(format!(
                "{} bytes is shorter than the {} byte header",
                buf.len(),
                Self::LEN
            )));
        }

        let mut c = Cursor::new(buf);
        let header = Self::read_from(&mut c)
            .map_err(|e| Error::malformed_header(format!("truncated header: {e}")))?;

        let size = header.size as usize;
        if size < Self::LEN {
            return Err(Error::malformed_header(format!(
                "declared size {size} is smaller than the header"
            )));
        }
        if size != buf.len() {
            return Err(Error::malformed_header(format!(
                "declared size {size} but datagram has {} bytes",
                buf.len()
            )));
        }

        Ok(header)
    }

    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let size = r.read_u16::<LittleEndian>()?;
        let protocol = r.read_u16::<LittleEndian>()?;
        let reserved1 = r.read_u32::<LittleEndian>()?;
        let target = DeviceAddress::new(read_octets(r)?);
        let reserved2 = r.read_u16::<LittleEndian>()?;
        let site = SiteId::new(read_octets(r)?);
        let reserved3 = r.read_u16::<LittleEndian>()?;
        let timestamp = r.read_u64::<LittleEndian>()?;
        let packet_type = r.read_u16::<LittleEndian>()?;
        let reserved4 = r.read_u16::<LittleEndian>()?;

        Ok(PacketHeader {
            size,
            protocol,
            reserved1,
            target,
            reserved2,
            site,
            reserved3,
            timestamp,
            packet_type,
            reserved4,
        })
    }
}

pub(crate) fn read_octets<R: Read, const N: usize>(r: &mut R) -> std::io::Result<[u8; N]> {
    let mut octets = [0u8; N];
    r.read_exact(&mut octets)?;
    Ok(octets)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn hex(s: &str) -> Vec<u8> {
        let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        digits
            .chunks(2)
            .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
            .collect()
    }

    fn get_pan_gateway_msg() -> Vec<u8> {
        hex("24 00 00 54 00000000 000000000000 0000 000000000000 0000 0000000000000000 02 00 0000")
    }

    pub(crate) fn pan_gateway_msg() -> Vec<u8> {
        hex("2900005400000000d073d50035f70000d073d50035f70000000000000000000003000000017cdd0000")
    }

    #[test]
    fn test_encode_get_pan_gateway() {
        let header = PacketHeader::new(Opcode::GetPanGateway);
        let buf = header.encode().unwrap();
        assert_eq!(buf.len(), PacketHeader::LEN);
        assert_eq!(buf, get_pan_gateway_msg());
    }

    #[test]
    fn test_decode_pan_gateway_header() {
        let header = PacketHeader::decode(&pan_gateway_msg()).unwrap();
        let addr = [0xd0, 0x73, 0xd5, 0x00, 0x35, 0xf7];
        assert_eq!(header.size, 41);
        assert_eq!(header.protocol, 0x5400);
        assert_eq!(header.target.octets(), addr);
        assert_eq!(header.site.octets(), addr);
        assert_eq!(header.opcode(), Some(Opcode::PanGateway));
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let buf = get_pan_gateway_msg();
        let err = PacketHeader::decode(&buf[..20]).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn test_decode_rejects_size_mismatch() {
        let mut buf = get_pan_gateway_msg();
        buf.push(0);
        assert!(matches!(
            PacketHeader::decode(&buf),
            Err(Error::MalformedHeader { .. })
        ));

        let mut undersized = get_pan_gateway_msg();
        undersized[0] = 0x10;
        assert!(matches!(
            PacketHeader::decode(&undersized),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_header_round_trip() {
        let header = PacketHeader {
            size: 36,
            protocol: 0x3400,
            reserved1: 7,
            target: DeviceAddress::new([1, 2, 3, 4, 5, 6]),
            reserved2: 9,
            site: SiteId::new([6, 5, 4, 3, 2, 1]),
            reserved3: 11,
            timestamp: 0x0102_0304_0506_0708,
            packet_type: 0x65,
            reserved4: 13,
        };
        let buf = header.encode().unwrap();
        assert_eq!(PacketHeader::decode(&buf).unwrap(), header);
    }
}
