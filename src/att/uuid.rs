//! Attribute type UUIDs.
//!
//! A request can name an attribute type either as a 16-bit alias or as a full 128-bit UUID, and
//! the database stores whichever form the application declared, so type matching has to bridge
//! the two widths. An alias stands for the full UUID obtained by inserting it into the Bluetooth
//! Base UUID; a mixed-width comparison therefore promotes the short side before comparing.
//!
//! 32-bit aliases exist elsewhere (eg. in advertising payloads) but are never transmitted in
//! attribute PDUs, so they have no representation here.

use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::uuid::{Uuid128, Uuid16};
use crate::Error;
use core::fmt;

/// An attribute type, in either of the widths the protocol transmits.
#[derive(Copy, Clone, Eq)]
pub enum AttUuid {
    Uuid16(Uuid16),
    Uuid128(Uuid128),
}

impl AttUuid {
    /// Returns how many octets this UUID occupies on the wire (2 or 16).
    pub fn size(&self) -> usize {
        match self {
            AttUuid::Uuid16(_) => 2,
            AttUuid::Uuid128(_) => 16,
        }
    }

    /// Returns whether this is a full 128-bit UUID.
    pub fn is_128bit(&self) -> bool {
        self.size() == 16
    }

    /// The full 128-bit form of this UUID, with aliases promoted through the Base UUID.
    fn expanded(&self) -> Uuid128 {
        match *self {
            AttUuid::Uuid16(alias) => alias.into(),
            AttUuid::Uuid128(uuid) => uuid,
        }
    }
}

/// Attribute types are equal when they name the same UUID, regardless of transmitted width.
impl PartialEq for AttUuid {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttUuid::Uuid16(a), AttUuid::Uuid16(b)) => a == b,
            (AttUuid::Uuid128(a), AttUuid::Uuid128(b)) => a == b,
            _ => self.expanded() == other.expanded(),
        }
    }
}

impl From<Uuid16> for AttUuid {
    fn from(alias: Uuid16) -> Self {
        AttUuid::Uuid16(alias)
    }
}

impl From<Uuid128> for AttUuid {
    fn from(uuid: Uuid128) -> Self {
        AttUuid::Uuid128(uuid)
    }
}

/// The width is not encoded anywhere; it follows from how many octets the PDU carries for the
/// type field, which at this point is everything the reader has left.
impl FromBytes<'_> for AttUuid {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        match bytes.bytes_left() {
            2 => Ok(Uuid16::from_bytes(bytes)?.into()),
            16 => Ok(<Uuid128 as FromBytes>::from_bytes(bytes)?.into()),
            _ => Err(Error::InvalidLength),
        }
    }
}

impl ToBytes for AttUuid {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        match self {
            AttUuid::Uuid16(alias) => alias.to_bytes(writer),
            AttUuid::Uuid128(uuid) => uuid.to_bytes(writer),
        }
    }
}

impl fmt::Debug for AttUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttUuid::Uuid16(alias) => alias.fmt(f),
            AttUuid::Uuid128(uuid) => uuid.fmt(f),
        }
    }
}

impl defmt::Format for AttUuid {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            AttUuid::Uuid16(alias) => alias.format(f),
            AttUuid::Uuid128(uuid) => uuid.format(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_width() {
        assert_eq!(AttUuid::from(Uuid16(0x2800)), AttUuid::from(Uuid16(0x2800)));
        assert_ne!(AttUuid::from(Uuid16(0x2800)), AttUuid::from(Uuid16(0x2803)));

        let vendor = Uuid128::parse_static("8c8b4094-0de2-499f-a28a-4eed5bc73ca9");
        assert_eq!(AttUuid::from(vendor), AttUuid::from(vendor));
    }

    #[test]
    fn aliases_match_their_promotion() {
        let alias = AttUuid::from(Uuid16(0x2a19));
        let promoted = AttUuid::from(Uuid128::parse_static(
            "00002a19-0000-1000-8000-00805f9b34fb",
        ));
        assert_eq!(alias, promoted);
        assert_eq!(promoted, alias);

        // A vendor UUID is off the Base UUID and never equals an alias.
        let vendor = AttUuid::from(Uuid128::parse_static(
            "8c8b4094-0de2-499f-a28a-4eed5bc73ca9",
        ));
        assert_ne!(alias, vendor);
        assert_ne!(vendor, promoted);
    }

    #[test]
    fn width_follows_remaining_octets() {
        let alias = AttUuid::from_bytes(&mut ByteReader::new(&[0x19, 0x2a])).unwrap();
        assert_eq!(alias.size(), 2);
        assert_eq!(alias, AttUuid::from(Uuid16(0x2a19)));

        assert_eq!(
            AttUuid::from_bytes(&mut ByteReader::new(&[0; 5])),
            Err(Error::InvalidLength)
        );
    }
}
