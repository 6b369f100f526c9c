//! Implementation of the Generic Attribute Profile (GATT).
//!
//! GATT describes a service framework that uses the Attribute Protocol for discovery and
//! interaction. This module turns a set of declared [`Service`]s into the flat, densely-handled
//! attribute sequence the ATT server walks.
//!
//! The database is fixed for the lifetime of the program and is never stored in expanded form:
//! [`Database::attribute_at`] materializes any attribute on demand from the service declarations,
//! which keeps the per-attribute memory cost at zero and makes the handle layout a pure function
//! of the declarations:
//!
//! * handle 1 is the first service's primary service declaration,
//! * each characteristic contributes its declaration attribute, immediately followed by the value
//!   attribute at the next handle, optionally followed by a CCCD and any fixed descriptors,
//! * services follow each other in declaration order without gaps.

pub mod characteristic;

use crate::att::{
    AttUuid, Attribute, AttributeType, AttributeValue, Handle,
};
use crate::uuid::Uuid16;

pub use self::characteristic::{Characteristic, Descriptor, Properties};

/// Attribute type of a primary service declaration.
pub const PRIMARY_SERVICE: Uuid16 = Uuid16(0x2800);

/// Attribute type of a characteristic declaration.
pub const CHARACTERISTIC: Uuid16 = Uuid16(0x2803);

/// Attribute type of the Client Characteristic Configuration descriptor.
pub const CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid16 = Uuid16(0x2902);

/// A primary service: a UUID and the characteristics grouped under it.
pub struct Service<'a> {
    pub uuid: AttUuid,
    pub characteristics: &'a [Characteristic<'a>],
}

impl Service<'_> {
    /// Number of attributes this service contributes to the database.
    pub fn attribute_count(&self) -> u16 {
        1 + self
            .characteristics
            .iter()
            .map(Characteristic::attribute_span)
            .sum::<u16>()
    }

    fn client_config_count(&self) -> usize {
        self.characteristics
            .iter()
            .filter(|c| c.client_config)
            .count()
    }
}

/// The attribute database: an ordered sequence of services, addressed by dense 1-based handles.
#[derive(Copy, Clone)]
pub struct Database<'a> {
    services: &'a [Service<'a>],
}

/// A service's position in the database.
pub struct ServiceGroup<'a> {
    pub service: &'a Service<'a>,
    /// Handle of the primary service declaration.
    pub start: Handle,
    /// Handle of the last attribute belonging to the service.
    pub end: Handle,
}

/// Location of a characteristic value inside the database.
pub struct ValueBinding {
    /// Handle of the value attribute.
    pub handle: Handle,
    /// The characteristic's client configuration slot, if it has a CCCD.
    pub config_slot: Option<usize>,
}

impl<'a> Database<'a> {
    /// Creates a database over the given services.
    pub fn new(services: &'a [Service<'a>]) -> Self {
        assert!(
            !services.is_empty(),
            "a server should at least contain one service"
        );
        Self { services }
    }

    /// Returns the total number of attributes (`N`; valid handles are `1..=N`).
    pub fn attribute_count(&self) -> u16 {
        self.services.iter().map(Service::attribute_count).sum()
    }

    /// Returns the handle of the last attribute in the database.
    pub fn last_handle(&self) -> Handle {
        Handle::from_raw(self.attribute_count())
    }

    /// Returns the number of client configuration slots the database needs per connection.
    ///
    /// Use this to size the `CONFIGS` parameter of [`Connection`].
    ///
    /// [`Connection`]: crate::att::Connection
    pub fn client_config_count(&self) -> usize {
        self.services.iter().map(Service::client_config_count).sum()
    }

    /// Materializes the attribute with the given handle.
    ///
    /// Returns `None` for the `NULL` handle and for handles past the end of the database.
    pub fn attribute_at(&self, handle: Handle) -> Option<Attribute<'a>> {
        let index = handle.as_u16();
        if index == 0 {
            return None;
        }

        let mut first = 1u16;
        let mut slot = 0usize;
        for service in self.services {
            let count = service.attribute_count();
            if index >= first + count {
                first += count;
                slot += service.client_config_count();
                continue;
            }

            let mut offset = index - first;
            if offset == 0 {
                return Some(Attribute {
                    att_type: AttributeType::Uuid16(PRIMARY_SERVICE),
                    handle,
                    value: AttributeValue::PrimaryService {
                        uuid: service.uuid,
                        attribute_count: count,
                    },
                });
            }
            offset -= 1;

            for ch in service.characteristics {
                let span = ch.attribute_span();
                if offset >= span {
                    offset -= span;
                    slot += ch.client_config as usize;
                    continue;
                }

                return Some(match offset {
                    0 => Attribute {
                        att_type: AttributeType::Uuid16(CHARACTERISTIC),
                        handle,
                        value: AttributeValue::CharacteristicDeclaration {
                            properties: ch.properties,
                            value_handle: handle.next(),
                            uuid: ch.uuid,
                        },
                    },
                    1 => Attribute {
                        att_type: match ch.uuid {
                            AttUuid::Uuid16(uuid) => AttributeType::Uuid16(uuid),
                            AttUuid::Uuid128(_) => AttributeType::Uuid128Marker,
                        },
                        handle,
                        value: AttributeValue::CharacteristicValue {
                            value: ch.value,
                            permissions: ch.permissions,
                        },
                    },
                    2 if ch.client_config => Attribute {
                        att_type: AttributeType::Uuid16(CLIENT_CHARACTERISTIC_CONFIGURATION),
                        handle,
                        value: AttributeValue::ClientConfig { slot },
                    },
                    _ => {
                        let descriptor =
                            &ch.descriptors[usize::from(offset) - 2 - ch.client_config as usize];
                        Attribute {
                            att_type: AttributeType::Uuid16(descriptor.uuid),
                            handle,
                            value: AttributeValue::Constant(descriptor.value),
                        }
                    }
                });
            }

            // The offsets above cover the whole group.
            unreachable!();
        }

        None
    }

    /// Iterates over the services and their handle ranges, in declaration order.
    pub fn groups(self) -> impl Iterator<Item = ServiceGroup<'a>> {
        let mut first = 1u16;
        self.services.iter().map(move |service| {
            let start = first;
            let count = service.attribute_count();
            first += count;
            ServiceGroup {
                service,
                start: Handle::from_raw(start),
                end: Handle::from_raw(start + count - 1),
            }
        })
    }

    /// Finds the characteristic value bound to the given application storage.
    ///
    /// `value` is compared by pointer identity against every characteristic's bound storage, so
    /// the caller must pass the same reference that was used in the declaration.
    pub fn find_value(&self, value: *const ()) -> Option<ValueBinding> {
        let mut next = 1u16;
        let mut slot = 0usize;
        for service in self.services {
            let mut decl = next + 1;
            for ch in service.characteristics {
                if ch.value as *const _ as *const () == value {
                    return Some(ValueBinding {
                        handle: Handle::from_raw(decl + 1),
                        config_slot: if ch.client_config { Some(slot) } else { None },
                    });
                }
                slot += ch.client_config as usize;
                decl += ch.attribute_span();
            }
            next += service.attribute_count();
        }

        None
    }
}
