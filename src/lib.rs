//! An ATT/GATT server for embedded BLE peripherals.
//!
//! Cobble implements the server side of the Bluetooth Low Energy Attribute Protocol: it hosts a
//! fixed database of services and characteristics, answers the ATT requests a connected client
//! sends over L2CAP channel `0x0004`, and emits Handle Value Notifications for subscribed
//! characteristics. It is hardware- and transport-agnostic: the link layer, radio and L2CAP
//! framing live elsewhere and talk to the server through plain byte buffers.
//!
//! There is no heap and no internal task: [`att::AttributeServer::l2cap_input`] runs to completion
//! on the transport's calling context and writes its response into the transport's buffer.
//! Everything per-connection lives in an [`att::Connection`] owned by the transport.
//!
//! # Example
//!
//! ```
//! use cobble::att::{AttributeServer, Connection};
//! use cobble::gatt::{Characteristic, Database, Service};
//! use cobble::uuid::Uuid16;
//! use core::cell::Cell;
//!
//! // Application-owned storage, bound into the database below.
//! let battery_level = Cell::new(98u8);
//!
//! let characteristics = [Characteristic::new(Uuid16(0x2A19), &battery_level)
//!     .no_write_access()
//!     .notify()];
//! let services = [Service {
//!     uuid: Uuid16(0x180F).into(),
//!     characteristics: &characteristics,
//! }];
//! let db = Database::new(&services);
//! assert_eq!(db.client_config_count(), 1);
//!
//! let server = AttributeServer::new(db).with_name("sensor");
//!
//! // The transport calls `l2cap_input` for every ATT PDU addressed to channel 0x0004.
//! // Here: a Read Request for handle 3, the battery level value.
//! let mut connection = Connection::<1>::new(23);
//! let mut response = [0; 23];
//! let len = server.l2cap_input(&[0x0A, 0x03, 0x00], &mut response, &mut connection);
//! assert_eq!(&response[..len], &[0x0B, 98]);
//! ```

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;
#[macro_use]
mod utils;

pub mod att;
pub mod bytes;
mod error;
pub mod gap;
pub mod gatt;
pub mod uuid;

pub use self::error::Error;
