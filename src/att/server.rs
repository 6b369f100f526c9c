//! ATT server implementation: request dispatch, discovery, reads/writes, notifications.

use {
    super::{
        access::{AccessArgs, AccessResult},
        connection::{ClientConfigs, Connection},
        handle::{Handle, HandleRange, RawHandleRange},
        pdus::{AttError, ErrorCode, Opcode, UUID_FORMAT_128BIT, UUID_FORMAT_16BIT},
        AttUuid, Attribute, AttributeType, AttributeValue, ValueAccess, DEFAULT_ATT_MTU,
    },
    crate::{
        bytes::{ByteReader, ByteWriter, FromBytes, ToBytes},
        gatt::{Database, PRIMARY_SERVICE},
        gap,
        utils::HexSlice,
        Error,
    },
    core::cmp,
};

/// Longest value field of a *Read By Type* tuple (`length` is a `u8` and covers the handle too).
const MAX_TUPLE_VALUE: usize = 253;

/// Handle octets preceding the value in a *Read By Type* tuple.
const TUPLE_HEADER: usize = 2;

/// An Attribute Protocol server answering requests against a fixed attribute database.
///
/// The server itself is stateless: everything per-connection lives in the [`Connection`] passed
/// into [`l2cap_input`], and the database is immutable, so a single server can be shared freely.
///
/// [`l2cap_input`]: AttributeServer::l2cap_input
pub struct AttributeServer<'a> {
    db: Database<'a>,
    name: Option<&'a str>,
}

impl<'a> AttributeServer<'a> {
    /// Creates an attribute server over `db`.
    pub fn new(db: Database<'a>) -> Self {
        Self { db, name: None }
    }

    /// Sets the device name advertised by [`advertising_data`].
    ///
    /// [`advertising_data`]: AttributeServer::advertising_data
    pub fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Returns the attribute database hosted by this server.
    pub fn database(&self) -> Database<'a> {
        self.db
    }

    /// Processes one ATT PDU addressed to this server and writes the response into `output`.
    ///
    /// `input` must contain at least the opcode octet and `output` must hold at least
    /// [`DEFAULT_ATT_MTU`] octets; the usable response space is clipped to the connection's
    /// negotiated MTU before any handler runs.
    ///
    /// Returns the number of response octets written. Exactly one response (possibly an ATT Error
    /// Response) is produced per request; a return value of 0 means not even an error response
    /// fits, and the transport must drop the exchange.
    pub fn l2cap_input<const CONFIGS: usize>(
        &self,
        input: &[u8],
        output: &mut [u8],
        connection: &mut Connection<CONFIGS>,
    ) -> usize {
        assert!(!input.is_empty());
        assert!(output.len() >= usize::from(DEFAULT_ATT_MTU));

        // Clip the response space to the negotiated MTU before any handler runs.
        let mtu = usize::from(connection.negotiated_mtu());
        let out_len = cmp::min(output.len(), mtu);
        let output = &mut output[..out_len];

        let opcode = Opcode::from(input[0]);
        debug!("ATT<- {:?} {:?}", opcode, HexSlice(input));

        let result = match opcode {
            Opcode::ExchangeMtuReq => self.exchange_mtu(input, output, connection),
            Opcode::FindInformationReq => {
                self.find_information(input, output, &mut connection.client_configs())
            }
            Opcode::FindByTypeValueReq => {
                self.find_by_type_value(input, output, &mut connection.client_configs())
            }
            Opcode::ReadByTypeReq => {
                self.read_by_type(input, output, &mut connection.client_configs())
            }
            Opcode::ReadReq => self.read(input, output, &mut connection.client_configs(), false),
            Opcode::ReadBlobReq => {
                self.read(input, output, &mut connection.client_configs(), true)
            }
            Opcode::ReadByGroupReq => self.read_by_group_type(input, output),
            Opcode::WriteReq => self.write(input, output, &mut connection.client_configs()),
            _ => {
                warn!("unsupported opcode {:?}", opcode);
                Err(AttError::new(ErrorCode::RequestNotSupported, Handle::NULL))
            }
        };

        match result {
            Ok(len) => len,
            Err(err) => {
                debug!("ATT-> {:?}", err);
                error_response(input[0], err, output)
            }
        }
    }

    /// Assembles the GAP advertising payload for this server into `buffer`.
    ///
    /// Returns the number of octets written; see [`gap::advertising_data`].
    pub fn advertising_data(&self, buffer: &mut [u8]) -> usize {
        gap::advertising_data(self.name, buffer)
    }

    /// Sends a Handle Value Notification carrying the current value of `value` to the client.
    ///
    /// `value` must be the same storage reference that was bound into the database; its value
    /// attribute handle is resolved from the database layout. The notification is only produced
    /// when the client has enabled notifications through the characteristic's CCCD.
    ///
    /// This only reads shared state, so it is safe to call from contexts that don't own the
    /// server (eg. another thread or an interrupt handler, given a sink that supports it).
    /// Ordering against concurrently produced responses is left to the transport.
    pub fn notify<const CONFIGS: usize>(
        &self,
        value: &dyn ValueAccess,
        connection: &Connection<CONFIGS>,
        sink: &mut dyn NotificationSink,
    ) -> Result<(), NotifyError> {
        let binding = self
            .db
            .find_value(value as *const dyn ValueAccess as *const ())
            .ok_or(NotifyError::NotBound)?;
        let slot = binding.config_slot.ok_or(NotifyError::NotEnabled)?;
        if !connection.notifications_enabled(slot) {
            return Err(NotifyError::NotEnabled);
        }

        let mtu = usize::from(connection.negotiated_mtu());
        sink.send_with(mtu, &mut |writer| {
            writer.write_u8(Opcode::HandleValueNotification.raw())?;
            writer.write_u16_le(binding.handle.as_u16())?;
            let n = value.read(0, writer.rest());
            writer.skip(n)
        })
        .map_err(|_| NotifyError::Dropped)
    }

    /// Checks a range request of size `size_a` (or `size_b`) and extracts its handle range.
    ///
    /// The starting handle must be non-zero, not greater than the ending handle, and within the
    /// database. The ending handle is clamped against the database during enumeration instead.
    fn check_size_and_handle_range(
        &self,
        input: &[u8],
        size_a: usize,
        size_b: usize,
    ) -> Result<HandleRange, AttError> {
        if input.len() != size_a && input.len() != size_b {
            return Err(AttError::new(ErrorCode::InvalidPdu, Handle::NULL));
        }

        let range = RawHandleRange::from_bytes(&mut ByteReader::new(&input[1..5]))?.check()?;
        if range.start() > self.db.last_handle() {
            return Err(AttError::attribute_not_found(range.start()));
        }

        Ok(range)
    }

    fn check_size_and_handle(&self, input: &[u8], size: usize) -> Result<Handle, AttError> {
        if input.len() != size {
            return Err(AttError::new(ErrorCode::InvalidPdu, Handle::NULL));
        }

        self.check_handle(input)
    }

    fn check_handle(&self, input: &[u8]) -> Result<Handle, AttError> {
        let handle = Handle::from_bytes(&mut ByteReader::new(&input[1..3]))?;
        if handle == Handle::NULL {
            return Err(AttError::new(ErrorCode::InvalidHandle, handle));
        }
        if handle > self.db.last_handle() {
            return Err(AttError::attribute_not_found(handle));
        }

        Ok(handle)
    }

    fn attribute_at(&self, handle: Handle) -> Result<Attribute<'a>, AttError> {
        self.db
            .attribute_at(handle)
            .ok_or_else(|| AttError::attribute_not_found(handle))
    }

    /// *Exchange MTU Request*: stores the client's MTU and answers with ours.
    ///
    /// The negotiated MTU takes effect for all following responses on the connection. A client
    /// re-negotiating is accepted and simply overwrites the previous value.
    fn exchange_mtu<const CONFIGS: usize>(
        &self,
        input: &[u8],
        output: &mut [u8],
        connection: &mut Connection<CONFIGS>,
    ) -> Result<usize, AttError> {
        if input.len() != 3 {
            return Err(AttError::new(ErrorCode::InvalidPdu, Handle::NULL));
        }

        let mtu = u16::from_le_bytes([input[1], input[2]]);
        if mtu < DEFAULT_ATT_MTU {
            return Err(AttError::new(ErrorCode::InvalidPdu, Handle::NULL));
        }

        connection.set_client_mtu(mtu);
        info!(
            "exchange MTU: client {}, negotiated {}",
            mtu,
            connection.negotiated_mtu()
        );

        let mut writer = ByteWriter::new(output);
        writer.write_u8(Opcode::ExchangeMtuRsp.raw())?;
        writer.write_u16_le(connection.server_mtu())?;
        Ok(3)
    }

    /// *Find Information Request*: lists handle/UUID tuples in the requested range.
    ///
    /// The starting attribute determines whether the response uses the 16-bit or the 128-bit
    /// format; attributes of the other UUID kind are skipped, since one response must never mix
    /// formats.
    fn find_information(
        &self,
        input: &[u8],
        output: &mut [u8],
        configs: &mut ClientConfigs<'_>,
    ) -> Result<usize, AttError> {
        let range = self.check_size_and_handle_range(input, 5, 5)?;

        let first = self.attribute_at(range.start())?;
        let long = first.att_type == AttributeType::Uuid128Marker;
        let tuple_size = if long { 2 + 16 } else { 2 + 2 };

        let total = output.len();
        let mut writer = ByteWriter::new(output);
        writer.write_u8(Opcode::FindInformationRsp.raw())?;
        writer.write_u8(if long {
            UUID_FORMAT_128BIT
        } else {
            UUID_FORMAT_16BIT
        })?;

        let mut eligible = false;
        for handle in range.handles(self.db.last_handle()) {
            let attr = match self.db.attribute_at(handle) {
                Some(attr) => attr,
                None => break,
            };
            if (attr.att_type == AttributeType::Uuid128Marker) != long {
                continue;
            }

            eligible = true;
            if writer.space_left() < tuple_size {
                break;
            }

            writer.write_u16_le(handle.as_u16())?;
            match attr.att_type {
                AttributeType::Uuid16(uuid) => uuid.to_bytes(&mut writer)?,
                AttributeType::Uuid128Marker => {
                    writer.write_slice(&self.long_uuid(&attr, configs)?)?
                }
            }
            trace!("find information: {:?} {:?}", handle, attr.att_type);
        }

        if !eligible {
            return Err(AttError::attribute_not_found(range.start()));
        }

        Ok(total - writer.space_left())
    }

    /// *Find By Type Value Request*: finds services whose UUID equals the request value.
    ///
    /// Only the Primary Service group type is searchable. The value comparison runs through the
    /// attribute access contract, so it works for 16-bit and 128-bit service UUIDs alike.
    fn find_by_type_value(
        &self,
        input: &[u8],
        output: &mut [u8],
        configs: &mut ClientConfigs<'_>,
    ) -> Result<usize, AttError> {
        let range = self.check_size_and_handle_range(input, 9, 23)?;

        if u16::from_le_bytes([input[5], input[6]]) != PRIMARY_SERVICE.0 {
            // The spec doesn't define a response for other group types; this is the closest fit.
            return Err(AttError::new(ErrorCode::UnsupportedGroupType, range.start()));
        }
        let value = &input[7..];

        let total = output.len();
        let mut writer = ByteWriter::new(output);
        writer.write_u8(Opcode::FindByTypeValueRsp.raw())?;

        let mut found = false;
        for group in self.db.groups() {
            if !range.contains(group.start) {
                continue;
            }

            let decl = self.attribute_at(group.start)?;
            let mut args = AccessArgs::compare(value);
            if decl.access(&mut args, configs) != AccessResult::ValueEqual {
                continue;
            }

            if writer.space_left() < 4 {
                break;
            }
            writer.write_u16_le(group.start.as_u16())?;
            writer.write_u16_le(group.end.as_u16())?;
            found = true;
        }

        if !found {
            return Err(AttError::attribute_not_found(range.start()));
        }

        Ok(total - writer.space_left())
    }

    /// *Read By Group Type Request*: enumerates primary service groups.
    ///
    /// All tuples of one response share a single `length`, so the UUID width is fixed by the
    /// first service in range and services of the other width are left for a follow-up request.
    fn read_by_group_type(&self, input: &[u8], output: &mut [u8]) -> Result<usize, AttError> {
        let range = self.check_size_and_handle_range(input, 7, 21)?;

        // Only the 16-bit encoding of the Primary Service UUID is accepted here.
        if input.len() == 21 || u16::from_le_bytes([input[5], input[6]]) != PRIMARY_SERVICE.0 {
            return Err(AttError::new(ErrorCode::UnsupportedGroupType, range.start()));
        }

        let total = output.len();
        let mut writer = ByteWriter::new(output);
        writer.write_u8(Opcode::ReadByGroupRsp.raw())?;
        let length = writer.split_next_mut().ok_or(Error::Eof)?;

        let mut tuple_size = None;
        for group in self.db.groups() {
            if !range.contains(group.start) {
                continue;
            }

            let size = 4 + group.service.uuid.size();
            if let Some(expected) = tuple_size {
                if size != expected {
                    continue;
                }
            }
            if writer.space_left() < size {
                break;
            }

            if tuple_size.is_none() {
                tuple_size = Some(size);
                *length = size as u8;
            }
            writer.write_u16_le(group.start.as_u16())?;
            writer.write_u16_le(group.end.as_u16())?;
            group.service.uuid.to_bytes(&mut writer)?;
            trace!("read by group: {:?}..{:?}", group.start, group.end);
        }

        if tuple_size.is_none() {
            return Err(AttError::attribute_not_found(range.start()));
        }

        Ok(total - writer.space_left())
    }

    /// *Read By Type Request*: reads all attributes of one type in the requested range.
    ///
    /// The first included attribute fixes the tuple length; later attributes are only included
    /// when their value reads at exactly that width, and a value is only accepted truncated when
    /// it fills the 253-octet tuple value cap.
    fn read_by_type(
        &self,
        input: &[u8],
        output: &mut [u8],
        configs: &mut ClientConfigs<'_>,
    ) -> Result<usize, AttError> {
        let range = self.check_size_and_handle_range(input, 7, 21)?;
        let requested = AttUuid::from_bytes(&mut ByteReader::new(&input[5..]))?;

        let (header, data) = output.split_at_mut(2);
        let mut current = 0;
        let mut value_size = None;

        for handle in range.handles(self.db.last_handle()) {
            let attr = match self.db.attribute_at(handle) {
                Some(attr) => attr,
                None => break,
            };
            if self.attribute_uuid(&attr) != Some(requested) {
                continue;
            }

            let space = data.len() - current;
            if space < TUPLE_HEADER {
                break;
            }
            let max_data = cmp::min(space, MAX_TUPLE_VALUE + TUPLE_HEADER) - TUPLE_HEADER;

            let region = &mut data[current + TUPLE_HEADER..current + TUPLE_HEADER + max_data];
            let mut args = AccessArgs::read(region, 0);
            let rc = attr.access(&mut args, configs);
            let n = args.bytes_read();

            let readable = match rc {
                AccessResult::Success => true,
                AccessResult::ReadTruncated => n == MAX_TUPLE_VALUE,
                _ => false,
            };
            if !readable {
                continue;
            }

            match value_size {
                None => value_size = Some(n),
                Some(expected) if expected != n => continue,
                Some(_) => {}
            }

            data[current..current + TUPLE_HEADER]
                .copy_from_slice(&handle.as_u16().to_le_bytes());
            current += TUPLE_HEADER + n;
        }

        match value_size {
            None => Err(AttError::attribute_not_found(range.start())),
            Some(size) => {
                header[0] = Opcode::ReadByTypeRsp.raw();
                header[1] = (TUPLE_HEADER + size) as u8;
                Ok(2 + current)
            }
        }
    }

    /// *Read Request* / *Read Blob Request*: reads one attribute value, at an offset for blobs.
    fn read(
        &self,
        input: &[u8],
        output: &mut [u8],
        configs: &mut ClientConfigs<'_>,
        blob: bool,
    ) -> Result<usize, AttError> {
        let handle = self.check_size_and_handle(input, if blob { 5 } else { 3 })?;
        let offset = if blob {
            usize::from(u16::from_le_bytes([input[3], input[4]]))
        } else {
            0
        };

        let attr = self.attribute_at(handle)?;
        let (opcode, value_region) = match output.split_first_mut() {
            Some(split) => split,
            None => return Err(Error::Eof.into()),
        };

        let mut args = AccessArgs::read(value_region, offset);
        match attr.access(&mut args, configs) {
            AccessResult::Success | AccessResult::ReadTruncated => {
                *opcode = if blob {
                    Opcode::ReadBlobRsp.raw()
                } else {
                    Opcode::ReadRsp.raw()
                };
                Ok(1 + args.bytes_read())
            }
            AccessResult::InvalidOffset if blob => {
                Err(AttError::new(ErrorCode::InvalidOffset, handle))
            }
            _ => Err(AttError::new(ErrorCode::ReadNotPermitted, handle)),
        }
    }

    /// *Write Request*: replaces one attribute value.
    fn write(
        &self,
        input: &[u8],
        output: &mut [u8],
        configs: &mut ClientConfigs<'_>,
    ) -> Result<usize, AttError> {
        if input.len() < 3 {
            return Err(AttError::new(ErrorCode::InvalidPdu, Handle::NULL));
        }
        let handle = self.check_handle(input)?;

        let attr = self.attribute_at(handle)?;
        let mut args = AccessArgs::write(&input[3..]);
        match attr.access(&mut args, configs) {
            AccessResult::Success => {
                output[0] = Opcode::WriteRsp.raw();
                Ok(1)
            }
            AccessResult::WriteOverflow => Err(AttError::new(
                ErrorCode::InvalidAttributeValueLength,
                handle,
            )),
            _ => Err(AttError::new(ErrorCode::WriteNotPermitted, handle)),
        }
    }

    /// Returns the full type UUID of `attr`, reading 128-bit UUIDs out of the preceding
    /// characteristic declaration.
    fn attribute_uuid(&self, attr: &Attribute<'_>) -> Option<AttUuid> {
        match attr.att_type {
            AttributeType::Uuid16(uuid) => Some(uuid.into()),
            AttributeType::Uuid128Marker => {
                let decl = self
                    .db
                    .attribute_at(Handle::from_raw(attr.handle.as_u16().checked_sub(1)?))?;
                match decl.value {
                    AttributeValue::CharacteristicDeclaration { uuid, .. } => Some(uuid),
                    _ => None,
                }
            }
        }
    }

    /// Recovers a value attribute's 128-bit UUID by reading the characteristic declaration right
    /// before it; the declaration's value is `properties(1) ‖ value_handle(2) ‖ uuid(16)`.
    fn long_uuid(
        &self,
        attr: &Attribute<'_>,
        configs: &mut ClientConfigs<'_>,
    ) -> Result<[u8; 16], AttError> {
        let unlikely = AttError::new(ErrorCode::UnlikelyError, attr.handle);

        let decl_handle = Handle::from_raw(attr.handle.as_u16() - 1);
        let decl = self.db.attribute_at(decl_handle).ok_or(unlikely)?;

        let mut scratch = [0; 19];
        let mut args = AccessArgs::read(&mut scratch, 0);
        let rc = decl.access(&mut args, configs);
        if !rc.is_read() || args.bytes_read() != 19 {
            return Err(unlikely);
        }

        let mut uuid = [0; 16];
        uuid.copy_from_slice(&scratch[3..19]);
        Ok(uuid)
    }
}

/// Renders `err` as an ATT Error Response for the request opcode `request`.
///
/// Returns 0 (telling the transport to drop) when not even the 5 error octets fit.
fn error_response(request: u8, err: AttError, output: &mut [u8]) -> usize {
    if output.len() < 5 {
        error!("output too small for an error response ({}B)", output.len());
        return 0;
    }

    output[0] = Opcode::ErrorRsp.raw();
    output[1] = request;
    output[2..4].copy_from_slice(&err.handle().as_u16().to_le_bytes());
    output[4] = err.error_code().into();
    5
}

/// Transport-owned sink for server-initiated PDUs.
///
/// Implementations hand out a chunk of transmit queue space, let the server compose the PDU
/// directly into it, and enqueue the composed octets. The only ordering guarantee the server
/// needs is that each composed PDU is sent atomically; interleaving with request responses is the
/// transport's business.
pub trait NotificationSink {
    /// Makes up to `max` octets of buffer space available to `compose` and transmits what it
    /// wrote.
    ///
    /// Returns an error when the PDU cannot be accepted (it is then dropped, which ATT allows for
    /// notifications).
    fn send_with(
        &mut self,
        max: usize,
        compose: &mut dyn FnMut(&mut ByteWriter<'_>) -> Result<(), Error>,
    ) -> Result<(), Error>;
}

/// Reasons a notification was not handed to the transport.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The value is not bound to any characteristic in the database.
    NotBound,
    /// The characteristic has no CCCD or the client has not enabled notifications.
    NotEnabled,
    /// The transport refused the PDU.
    Dropped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::AttributeAccessPermissions;
    use crate::gatt::{Characteristic, Database, Properties, Service};
    use crate::uuid::{Uuid128, Uuid16};
    use core::cell::Cell;

    fn hex(s: &str) -> Vec<u8> {
        s.split_whitespace()
            .map(|byte| u8::from_str_radix(byte, 16).unwrap())
            .collect()
    }

    /// Runs requests against a battery server shaped like the classic minimal example: one
    /// primary service 0x180F at handles 1..=3, battery level 0x55 at handle 3 (readable,
    /// notify property advertised but no CCCD), server MTU 23.
    fn battery_exchange(requests: &[(&str, &str)]) {
        let battery = Cell::new(0x55u8);
        let characteristics = [Characteristic {
            uuid: AttUuid::Uuid16(Uuid16(0x2A19)),
            value: &battery,
            permissions: AttributeAccessPermissions::Readable,
            properties: Properties::READ | Properties::NOTIFY,
            client_config: false,
            descriptors: &[],
        }];
        let services = [Service {
            uuid: AttUuid::Uuid16(Uuid16(0x180F)),
            characteristics: &characteristics,
        }];
        let server = AttributeServer::new(Database::new(&services));
        let mut connection = Connection::<0>::new(23);

        for (request, response) in requests {
            let mut buf = [0; 23];
            let len = server.l2cap_input(&hex(request), &mut buf, &mut connection);
            assert_eq!(
                buf[..len],
                hex(response)[..],
                "request {:?} answered wrong",
                request
            );
        }
    }

    #[test]
    fn exchange_mtu() {
        battery_exchange(&[("02 17 00", "03 17 00")]);
    }

    #[test]
    fn exchange_mtu_rejects_tiny_mtu() {
        battery_exchange(&[("02 16 00", "01 02 00 00 04"), ("02 17", "01 02 00 00 04")]);
    }

    #[test]
    fn read() {
        battery_exchange(&[("0A 03 00", "0B 55")]);
    }

    #[test]
    fn read_is_idempotent() {
        battery_exchange(&[("0A 03 00", "0B 55"), ("0A 03 00", "0B 55")]);
    }

    #[test]
    fn read_null_handle() {
        battery_exchange(&[("0A 00 00", "01 0A 00 00 01")]);
    }

    #[test]
    fn read_past_database_end() {
        battery_exchange(&[("0A 09 00", "01 0A 09 00 0A")]);
    }

    #[test]
    fn discover_primary_services() {
        battery_exchange(&[("10 01 00 FF FF 00 28", "11 06 01 00 03 00 0F 18")]);
    }

    #[test]
    fn discover_rejects_other_group_types() {
        battery_exchange(&[("10 01 00 FF FF 01 29", "01 10 01 00 10")]);
    }

    #[test]
    fn find_service_by_value() {
        battery_exchange(&[("06 01 00 FF FF 00 28 0F 18", "07 01 00 03 00")]);
    }

    #[test]
    fn find_service_by_value_no_match() {
        battery_exchange(&[("06 01 00 FF FF 00 28 0F 19", "01 06 01 00 0A")]);
    }

    #[test]
    fn read_battery_level_by_type() {
        battery_exchange(&[("08 01 00 FF FF 19 2A", "09 03 03 00 55")]);
    }

    #[test]
    fn write_to_read_only_value() {
        battery_exchange(&[("12 03 00 77", "01 12 03 00 03")]);
    }

    #[test]
    fn unknown_opcodes_are_rejected() {
        battery_exchange(&[
            ("FF", "01 FF 00 00 06"),
            ("52 03 00 77", "01 52 00 00 06"),
            ("16 03 00 00 00 77", "01 16 00 00 06"),
        ]);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        battery_exchange(&[
            ("04 00 00 FF FF", "01 04 00 00 01"),
            ("04 02 00 01 00", "01 04 02 00 01"),
            ("04 04 00 FF FF", "01 04 04 00 0A"),
            ("04 01 00", "01 04 00 00 04"),
        ]);
    }

    #[test]
    fn find_information_lists_types() {
        battery_exchange(&[(
            "04 01 00 FF FF",
            "05 01 01 00 00 28 02 00 03 28 03 00 19 2A",
        )]);
    }

    #[test]
    fn read_characteristic_declaration_by_type() {
        // props=read|notify (0x12), value handle 3, UUID 0x2A19.
        battery_exchange(&[("08 01 00 FF FF 03 28", "09 07 02 00 12 03 00 19 2A")]);
    }

    fn sensor_parts() -> (Cell<[u8; 30]>, Cell<u16>) {
        (Cell::new(*b"the quick brown fox jumps over"), Cell::new(0))
    }

    /// Server with a 30-octet value at handle 3 (read/write) and a notifying u16 at handle 5
    /// with its CCCD at handle 6; server MTU 23 unless the test negotiates a larger one.
    fn sensor_server(test: impl FnOnce(&AttributeServer<'_>, &mut Connection<1>, &dyn ValueAccess)) {
        let (text, reading) = sensor_parts();
        let characteristics = [
            Characteristic::new(Uuid16(0x2A3D), &text),
            Characteristic::new(Uuid16(0x2A6E), &reading)
                .no_write_access()
                .notify(),
        ];
        let services = [Service {
            uuid: AttUuid::Uuid16(Uuid16(0x181A)),
            characteristics: &characteristics,
        }];
        let db = Database::new(&services);
        assert_eq!(db.client_config_count(), 1);
        let server = AttributeServer::new(db);
        let mut connection = Connection::<1>::new(100);

        reading.set(0x1234);
        test(&server, &mut connection, &reading);
    }

    fn transact<const C: usize>(
        server: &AttributeServer<'_>,
        connection: &mut Connection<C>,
        request: &str,
    ) -> Vec<u8> {
        let mut buf = [0; 128];
        let len = server.l2cap_input(&hex(request), &mut buf, connection);
        buf[..len].to_vec()
    }

    #[test]
    fn long_read_is_clamped_to_negotiated_mtu() {
        sensor_server(|server, connection, _| {
            // Default MTU: 22 value octets fit behind the opcode.
            let response = transact(server, connection, "0A 03 00");
            assert_eq!(response.len(), 23);
            assert_eq!(&response[1..], b"the quick brown fox ju");

            // After negotiating a larger MTU the whole value is returned.
            assert_eq!(transact(server, connection, "02 64 00"), hex("03 64 00"));
            let response = transact(server, connection, "0A 03 00");
            assert_eq!(&response[1..], b"the quick brown fox jumps over");
        });
    }

    #[test]
    fn read_blob_offsets() {
        sensor_server(|server, connection, _| {
            let response = transact(server, connection, "0C 03 00 14 00");
            assert_eq!(&response[..1], &[0x0D]);
            assert_eq!(&response[1..], b"jumps over");

            // Offset == length is an empty read, one past it is an error.
            assert_eq!(transact(server, connection, "0C 03 00 1E 00"), [0x0D]);
            assert_eq!(
                transact(server, connection, "0C 03 00 1F 00"),
                hex("01 0C 03 00 07")
            );
        });
    }

    #[test]
    fn write_then_read_round_trip() {
        sensor_server(|server, connection, _| {
            let mut request = hex("12 03 00");
            request.extend_from_slice(b"all work and no play dirty boy");
            let mut buf = [0; 128];
            let len = server.l2cap_input(&request, &mut buf, connection);
            assert_eq!(&buf[..len], [0x13]);

            assert_eq!(transact(server, connection, "02 64 00"), hex("03 64 00"));
            let response = transact(server, connection, "0A 03 00");
            assert_eq!(&response[1..], b"all work and no play dirty boy");
        });
    }

    #[test]
    fn oversized_write_is_rejected() {
        sensor_server(|server, connection, _| {
            let mut request = hex("12 03 00");
            request.extend_from_slice(&[0; 31]);
            let mut buf = [0; 128];
            let len = server.l2cap_input(&request, &mut buf, connection);
            assert_eq!(&buf[..len], &hex("01 12 03 00 0D")[..]);
        });
    }

    #[test]
    fn write_to_write_protected_value() {
        sensor_server(|server, connection, _| {
            assert_eq!(
                transact(server, connection, "12 05 00 AA BB"),
                hex("01 12 05 00 03")
            );
        });
    }

    struct QueueSink {
        pdus: Vec<Vec<u8>>,
        drop_all: bool,
    }

    impl QueueSink {
        fn new() -> Self {
            Self {
                pdus: Vec::new(),
                drop_all: false,
            }
        }
    }

    impl NotificationSink for QueueSink {
        fn send_with(
            &mut self,
            max: usize,
            compose: &mut dyn FnMut(&mut ByteWriter<'_>) -> Result<(), Error>,
        ) -> Result<(), Error> {
            if self.drop_all {
                return Err(Error::Eof);
            }

            let mut buf = vec![0; max];
            let mut writer = ByteWriter::new(&mut buf);
            compose(&mut writer)?;
            let used = max - writer.space_left();
            buf.truncate(used);
            self.pdus.push(buf);
            Ok(())
        }
    }

    #[test]
    fn cccd_gates_notifications() {
        sensor_server(|server, connection, reading| {
            let mut sink = QueueSink::new();

            // Nothing subscribed yet.
            assert_eq!(
                server.notify(reading, connection, &mut sink),
                Err(NotifyError::NotEnabled)
            );

            // Subscribe via the CCCD at handle 6, then notify.
            assert_eq!(transact(server, connection, "12 06 00 01 00"), [0x13]);
            assert_eq!(transact(server, connection, "0A 06 00"), hex("0B 01 00"));
            server.notify(reading, connection, &mut sink).unwrap();
            assert_eq!(sink.pdus, [hex("1B 05 00 34 12")]);

            // Unsubscribe again.
            assert_eq!(transact(server, connection, "12 06 00 00 00"), [0x13]);
            assert_eq!(
                server.notify(reading, connection, &mut sink),
                Err(NotifyError::NotEnabled)
            );
        });
    }

    #[test]
    fn cccd_write_length_is_checked() {
        sensor_server(|server, connection, _| {
            assert_eq!(
                transact(server, connection, "12 06 00 01"),
                hex("01 12 06 00 0D")
            );
            assert_eq!(
                transact(server, connection, "12 06 00 01 00 00"),
                hex("01 12 06 00 0D")
            );
        });
    }

    #[test]
    fn notify_reports_transport_drops() {
        sensor_server(|server, connection, reading| {
            let mut sink = QueueSink::new();
            sink.drop_all = true;

            assert_eq!(transact(server, connection, "12 06 00 01 00"), [0x13]);
            assert_eq!(
                server.notify(reading, connection, &mut sink),
                Err(NotifyError::Dropped)
            );
        });
    }

    #[test]
    fn notify_requires_bound_value() {
        sensor_server(|server, connection, _| {
            let stray = Cell::new(0u8);
            let mut sink = QueueSink::new();
            assert_eq!(
                server.notify(&stray, connection, &mut sink),
                Err(NotifyError::NotBound)
            );
        });
    }

    /// Two services with a 128-bit UUID characteristic in the second one.
    fn custom_server(test: impl FnOnce(&AttributeServer<'_>, &mut Connection<0>)) {
        const CUSTOM_SERVICE: Uuid128 =
            Uuid128::parse_static("8c8b4094-0de2-499f-a28a-4eed5bc73ca9");
        const CUSTOM_CHAR: Uuid128 =
            Uuid128::parse_static("8c8b4095-0de2-499f-a28a-4eed5bc73ca9");

        let battery = Cell::new(0x55u8);
        let raw = Cell::new([0xAAu8, 0xBB]);
        let battery_chars = [Characteristic::new(Uuid16(0x2A19), &battery).no_write_access()];
        let custom_chars = [Characteristic::new(CUSTOM_CHAR, &raw)];
        let services = [
            Service {
                uuid: AttUuid::Uuid16(Uuid16(0x180F)),
                characteristics: &battery_chars,
            },
            Service {
                uuid: AttUuid::Uuid128(CUSTOM_SERVICE),
                characteristics: &custom_chars,
            },
        ];
        let server = AttributeServer::new(Database::new(&services));
        let mut connection = Connection::<0>::new(64);
        test(&server, &mut connection);
    }

    #[test]
    fn group_discovery_keeps_one_tuple_width() {
        custom_server(|server, connection| {
            // The 16-bit service comes first and fixes the width; the 128-bit one is omitted.
            assert_eq!(
                transact(server, connection, "10 01 00 FF FF 00 28"),
                hex("11 06 01 00 03 00 0F 18")
            );

            // Restarting past the first group returns the 128-bit service alone.
            let response = transact(server, connection, "10 04 00 FF FF 00 28");
            assert_eq!(response[..2], [0x11, 20]);
            assert_eq!(response[2..4], [0x04, 0x00]);
            assert_eq!(response[4..6], [0x06, 0x00]);
            assert_eq!(response[6..8], [0xA9, 0x3C]); // UUID is little-endian on the wire

            // A 128-bit group type or a non-service type is not searchable.
            let mut request = hex("10 01 00 FF FF");
            request.extend_from_slice(&response[6..22]);
            let mut buf = [0; 64];
            let len = server.l2cap_input(&request, &mut buf, connection);
            assert_eq!(&buf[..len], &hex("01 10 01 00 10")[..]);
        });
    }

    #[test]
    fn find_by_value_matches_long_uuids() {
        custom_server(|server, connection| {
            let mut request = hex("06 01 00 FF FF 00 28");
            let mut uuid = *Uuid128::parse_static("8c8b4094-0de2-499f-a28a-4eed5bc73ca9")
                .as_bytes();
            uuid.reverse();
            request.extend_from_slice(&uuid);

            let mut buf = [0; 64];
            let len = server.l2cap_input(&request, &mut buf, connection);
            assert_eq!(&buf[..len], &hex("07 04 00 06 00")[..]);
        });
    }

    #[test]
    fn find_information_switches_to_long_format() {
        custom_server(|server, connection| {
            // Starting at the 128-bit value attribute selects the 128-bit format.
            let response = transact(server, connection, "04 06 00 FF FF");
            assert_eq!(response[..2], [0x05, 0x02]);
            assert_eq!(response.len(), 2 + 2 + 16);
            assert_eq!(response[2..4], [0x06, 0x00]);
            assert_eq!(response[4..6], [0xA9, 0x3C]);
            assert_eq!(response[16..18], [0x95, 0x40]);

            // Starting at a 16-bit attribute keeps the short format and skips the long value.
            let response = transact(server, connection, "04 04 00 FF FF");
            assert_eq!(
                response,
                hex("05 01 04 00 00 28 05 00 03 28")
            );
        });
    }

    #[test]
    fn read_by_type_with_long_uuid() {
        custom_server(|server, connection| {
            let mut request = hex("08 01 00 FF FF");
            let mut uuid = *Uuid128::parse_static("8c8b4095-0de2-499f-a28a-4eed5bc73ca9")
                .as_bytes();
            uuid.reverse();
            request.extend_from_slice(&uuid);

            let mut buf = [0; 64];
            let len = server.l2cap_input(&request, &mut buf, connection);
            assert_eq!(&buf[..len], &hex("09 04 06 00 AA BB")[..]);
        });
    }

    #[test]
    fn read_by_type_packs_same_width_tuples() {
        // Three one-octet values of the same type; all fit into one response.
        let (a, b, c) = (Cell::new(1u8), Cell::new(2u8), Cell::new(3u8));
        let characteristics = [
            Characteristic::new(Uuid16(0x2A56), &a),
            Characteristic::new(Uuid16(0x2A56), &b),
            Characteristic::new(Uuid16(0x2A56), &c),
        ];
        let services = [Service {
            uuid: AttUuid::Uuid16(Uuid16(0x1815)),
            characteristics: &characteristics,
        }];
        let server = AttributeServer::new(Database::new(&services));
        let mut connection = Connection::<0>::new(23);

        assert_eq!(
            transact(&server, &mut connection, "08 01 00 FF FF 56 2A"),
            hex("09 03 03 00 01 05 00 02 07 00 03")
        );
    }

    #[test]
    fn static_descriptors_are_served() {
        use crate::gatt::Descriptor;

        let level = Cell::new(7u8);
        let descriptors = [Descriptor {
            uuid: Uuid16(0x2901),
            value: b"fill level",
        }];
        let characteristics = [Characteristic::new(Uuid16(0x2A19), &level)
            .no_write_access()
            .notify()
            .with_descriptors(&descriptors)];
        let services = [Service {
            uuid: AttUuid::Uuid16(Uuid16(0x180F)),
            characteristics: &characteristics,
        }];
        let server = AttributeServer::new(Database::new(&services));
        let mut connection = Connection::<1>::new(23);

        // decl 1, char decl 2, value 3, CCCD 4, user description 5.
        let response = transact(&server, &mut connection, "0A 05 00");
        assert_eq!(&response[1..], b"fill level");

        assert_eq!(
            transact(&server, &mut connection, "12 05 00 00"),
            hex("01 12 05 00 03")
        );

        assert_eq!(
            transact(&server, &mut connection, "04 04 00 05 00"),
            hex("05 01 04 00 02 29 05 00 01 29")
        );
    }

    #[test]
    fn advertising_payload() {
        let battery = Cell::new(0u8);
        let characteristics = [Characteristic::new(Uuid16(0x2A19), &battery)];
        let services = [Service {
            uuid: AttUuid::Uuid16(Uuid16(0x180F)),
            characteristics: &characteristics,
        }];
        let server = AttributeServer::new(Database::new(&services)).with_name("rusty");

        let mut buf = [0; 31];
        let len = server.advertising_data(&mut buf);
        assert_eq!(&buf[..len], &hex("02 01 06 06 09 72 75 73 74 79")[..]);
    }
}
