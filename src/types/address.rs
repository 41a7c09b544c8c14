//! Six-byte device and site identifiers.

use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

macro_rules! six_byte_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde_with::SerializeDisplay,
            serde_with::DeserializeFromStr,
        )]
        pub struct $name([u8; 6]);

        impl $name {
            /// The all-zero identifier.
            pub const ZERO: $name = $name([0; 6]);

            pub const fn new(bytes: [u8; 6]) -> Self {
                $name(bytes)
            }

            pub const fn octets(&self) -> [u8; 6] {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0; 6]
            }
        }

        impl From<[u8; 6]> for $name {
            fn from(bytes: [u8; 6]) -> Self {
                $name(bytes)
            }
        }

        /// Formats as twelve lowercase hex digits, e.g. `d073d50035f7`.
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        /// Accepts `d073d50035f7` as well as `d0:73:d5:00:35:f7` or `d0-73-...`.
        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_octets(s).map($name)
            }
        }
    };
}

six_byte_id! {
    /// Hardware address of a bulb or gateway (the header's target field).
    DeviceAddress
}

six_byte_id! {
    /// Identifier of a gateway's mesh; every bulb behind a gateway shares it.
    SiteId
}

fn parse_octets(s: &str) -> Result<[u8; 6], Error> {
    let digits: String = s.chars().filter(|c| !matches!(c, ':' | '-')).collect();
    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidAddress(s.to_string()));
    }

    let mut octets = [0u8; 6];
    for (idx, slot) in octets.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&digits[idx * 2..idx * 2 + 2], 16)
            .map_err(|_| Error::InvalidAddress(s.to_string()))?;
    }
    Ok(octets)
}
