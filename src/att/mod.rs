//! Implementation of the Attribute Protocol (ATT), server role.
//!
//! ATT always runs over L2CAP channel `0x0004`, which is connected by default as soon as the
//! Link-Layer connection is established. The transport hands every reassembled PDU addressed to
//! that channel to [`AttributeServer::l2cap_input`] along with an output buffer, and sends back
//! whatever response the server leaves there.
//!
//! ATT is used by GATT, the *Generic Attribute Profile*, which introduces the concept of
//! *Services* and *Characteristics* which can all be accessed and discovered over the Attribute
//! Protocol.
//!
//! # Attributes
//!
//! The ATT server hosts a sequence of *Attributes*, which consist of the following:
//!
//! * A 16-bit *Attribute Handle* ([`Handle`]) uniquely identifying the attribute. Handles are
//!   dense: the database assigns `1..=N` with no gaps.
//! * A 16- or 128-bit UUID identifying the attribute type. To keep the per-attribute footprint
//!   small, only 16-bit types are stored directly; a value attribute with a 128-bit type carries a
//!   marker instead, and the actual UUID lives in the characteristic declaration right before it
//!   (see [`AttributeType`]).
//! * The attribute's *value*: fixed declaration octets, application-owned storage, or a
//!   per-connection configuration word, depending on the attribute kind ([`AttributeValue`]).
//!
//! All reads, writes and comparisons go through one uniform operation, [`Attribute::access`], so
//! the request handlers can walk the database without knowing any of this.

mod access;
mod connection;
mod handle;
mod pdus;
mod server;
mod uuid;

use crate::gatt::characteristic::Properties;
use crate::uuid::Uuid16;

pub use self::access::{AccessArgs, AccessResult, ValueAccess};
pub use self::connection::{
    ClientConfigs, Connection, CCCD_INDICATION, CCCD_NOTIFICATION,
};
pub use self::handle::{Handle, HandleRange};
pub use self::pdus::{AttError, ErrorCode, Opcode};
pub use self::server::{AttributeServer, NotificationSink, NotifyError};
pub use self::uuid::AttUuid;

/// The ATT_MTU every connection starts out with, and the smallest value the protocol allows.
pub const DEFAULT_ATT_MTU: u16 = 23;

/// The type of an attribute, as stored in the database.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttributeType {
    /// A 16-bit attribute type UUID.
    Uuid16(Uuid16),

    /// The attribute's type is a full 128-bit UUID.
    ///
    /// Only characteristic value attributes use this. The UUID itself is not stored again; it is
    /// recovered from octets 3..19 of the preceding characteristic declaration's value.
    Uuid128Marker,
}

/// Access rules of a characteristic value attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttributeAccessPermissions {
    Readable,
    Writeable,
    ReadableAndWriteable,
}

impl AttributeAccessPermissions {
    pub fn is_readable(&self) -> bool {
        match self {
            AttributeAccessPermissions::Readable
            | AttributeAccessPermissions::ReadableAndWriteable => true,
            AttributeAccessPermissions::Writeable => false,
        }
    }

    pub fn is_writeable(&self) -> bool {
        match self {
            AttributeAccessPermissions::Writeable
            | AttributeAccessPermissions::ReadableAndWriteable => true,
            AttributeAccessPermissions::Readable => false,
        }
    }
}

impl Default for AttributeAccessPermissions {
    fn default() -> Self {
        AttributeAccessPermissions::ReadableAndWriteable
    }
}

/// An ATT server attribute: a type, a handle, and the value behind it.
///
/// Attributes are not stored anywhere; the database materializes them on demand from the declared
/// services (see [`Database`]).
///
/// [`Database`]: crate::gatt::Database
pub struct Attribute<'a> {
    pub att_type: AttributeType,
    pub handle: Handle,
    pub value: AttributeValue<'a>,
}

/// The value behind an attribute, by attribute kind.
pub enum AttributeValue<'a> {
    /// A primary service declaration (`0x2800`). The value is the service UUID;
    /// `attribute_count` is the number of attributes in the service's group, including this one.
    PrimaryService {
        uuid: AttUuid,
        attribute_count: u16,
    },

    /// A characteristic declaration (`0x2803`). The value is
    /// `properties(1) ‖ value_handle(2) ‖ uuid(2|16)`.
    CharacteristicDeclaration {
        properties: Properties,
        value_handle: Handle,
        uuid: AttUuid,
    },

    /// A characteristic value bound to application storage.
    CharacteristicValue {
        value: &'a dyn ValueAccess,
        permissions: AttributeAccessPermissions,
    },

    /// A Client Characteristic Configuration descriptor (`0x2902`), backed by per-connection
    /// configuration slot `slot`.
    ClientConfig { slot: usize },

    /// Fixed octets owned by the database (eg. a static descriptor).
    Constant(&'a [u8]),
}

impl<'a> Attribute<'a> {
    /// Performs a read, write or compare against this attribute.
    ///
    /// `configs` are the per-connection configuration slots; only `ClientConfig` attributes touch
    /// them.
    pub fn access(&self, args: &mut AccessArgs<'_>, configs: &mut ClientConfigs<'_>) -> AccessResult {
        match &self.value {
            AttributeValue::PrimaryService { uuid, .. } => {
                let mut scratch = [0; 16];
                fixed_access(encode_uuid(uuid, &mut scratch), args)
            }

            AttributeValue::CharacteristicDeclaration {
                properties,
                value_handle,
                uuid,
            } => {
                let mut scratch = [0; 19];
                scratch[0] = properties.bits();
                scratch[1..3].copy_from_slice(&value_handle.as_u16().to_le_bytes());
                let uuid_len = uuid.size();
                encode_uuid_into(uuid, &mut scratch[3..3 + uuid_len]);
                fixed_access(&scratch[..3 + uuid_len], args)
            }

            AttributeValue::CharacteristicValue { value, permissions } => match args {
                AccessArgs::Read { .. } if !permissions.is_readable() => {
                    AccessResult::ReadNotPermitted
                }
                AccessArgs::Read {
                    buffer,
                    offset,
                    used,
                } => {
                    let size = value.size();
                    if *offset > size {
                        return AccessResult::InvalidOffset;
                    }

                    *used = value.read(*offset, buffer);
                    if *offset + *used < size {
                        AccessResult::ReadTruncated
                    } else {
                        AccessResult::Success
                    }
                }
                AccessArgs::Write { .. } if !permissions.is_writeable() => {
                    AccessResult::WriteNotPermitted
                }
                AccessArgs::Write { value: data } => value.write(data),
                AccessArgs::Compare { value: data } => {
                    if value.compare(data) {
                        AccessResult::ValueEqual
                    } else {
                        AccessResult::ValueNotEqual
                    }
                }
            },

            AttributeValue::ClientConfig { slot } => {
                let octets = [configs.get(*slot), 0];
                match args {
                    AccessArgs::Write { value } => {
                        if value.len() != 2 {
                            AccessResult::WriteOverflow
                        } else {
                            configs.set(*slot, value[0]);
                            AccessResult::Success
                        }
                    }
                    _ => fixed_access(&octets, args),
                }
            }

            AttributeValue::Constant(octets) => fixed_access(octets, args),
        }
    }
}

/// Serves an access against fixed value octets: reads with offset/truncation, no writes,
/// byte-exact compare.
fn fixed_access(octets: &[u8], args: &mut AccessArgs<'_>) -> AccessResult {
    match args {
        AccessArgs::Read {
            buffer,
            offset,
            used,
        } => {
            let (result, n) = access::read_octets(octets, buffer, *offset);
            *used = n;
            result
        }
        AccessArgs::Write { .. } => AccessResult::WriteNotPermitted,
        AccessArgs::Compare { value } => {
            if *value == octets {
                AccessResult::ValueEqual
            } else {
                AccessResult::ValueNotEqual
            }
        }
    }
}

/// Encodes `uuid` into the start of `scratch` (little-endian) and returns the encoded octets.
fn encode_uuid<'s>(uuid: &AttUuid, scratch: &'s mut [u8; 16]) -> &'s [u8] {
    let used = encode_uuid_into(uuid, scratch);
    &scratch[..used]
}

fn encode_uuid_into(uuid: &AttUuid, scratch: &mut [u8]) -> usize {
    use crate::bytes::{ByteWriter, ToBytes};

    let mut writer = ByteWriter::new(scratch);
    uuid.to_bytes(&mut writer).unwrap();
    uuid.size()
}
