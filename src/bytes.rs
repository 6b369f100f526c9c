//! In-place PDU (de)serialization.
//!
//! Response PDUs are assembled directly inside the transport's output buffer: a [`ByteWriter`]
//! wraps the buffer, hands out space field by field, and tracks how much room the negotiated MTU
//! leaves for further tuples. Requests are taken apart the same way with a [`ByteReader`] over
//! the received octets. Both are plain slice wrappers; nothing is staged in intermediate storage.
//!
//! Wire-facing types (handles, UUIDs, handle ranges) implement [`ToBytes`]/[`FromBytes`] on top
//! of these, so the little-endian encoding rules live in one place per type.

use zerocopy::LayoutVerified;

use crate::Error;
use core::mem;

/// Writes PDU fields into a caller-supplied output buffer.
///
/// The writer's window shrinks as octets are produced; [`space_left`] is what the request
/// handlers check before committing to another response tuple. Asking for more room than the
/// window holds reports [`Error::Eof`] and produces nothing.
///
/// [`space_left`]: ByteWriter::space_left
pub struct ByteWriter<'a>(&'a mut [u8]);

impl<'a> ByteWriter<'a> {
    /// Creates a writer producing into `buffer`, starting at its first octet.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        ByteWriter(buffer)
    }

    /// Returns the number of octets still available for response data.
    pub fn space_left(&self) -> usize {
        self.0.len()
    }

    /// Takes the next `n` octets out of the window for direct filling.
    fn bump(&mut self, n: usize) -> Result<&'a mut [u8], Error> {
        if n > self.0.len() {
            return Err(Error::Eof);
        }

        let window = mem::take(&mut self.0);
        let (produced, rest) = window.split_at_mut(n);
        self.0 = rest;
        Ok(produced)
    }

    /// Reserves the next octet so its value can be filled in after later fields are known.
    ///
    /// The *Read By Type* and *Read By Group Type* responses carry a length octet whose value is
    /// fixed only once the first tuple has been encoded; the reservation makes that possible
    /// without buffering the tuples elsewhere.
    pub fn split_next_mut(&mut self) -> Option<&'a mut u8> {
        match self.bump(1) {
            Ok([octet]) => Some(octet),
            _ => None,
        }
    }

    /// Appends `octets` verbatim.
    ///
    /// UUIDs and value octets are already little-endian when they reach the writer.
    pub fn write_slice(&mut self, octets: &[u8]) -> Result<(), Error> {
        self.bump(octets.len())?.copy_from_slice(octets);
        Ok(())
    }

    /// Appends a single octet (opcodes, format and length fields).
    pub fn write_u8(&mut self, octet: u8) -> Result<(), Error> {
        self.bump(1)?[0] = octet;
        Ok(())
    }

    /// Appends a 16-bit field (handles, offsets, the announced MTU) in little-endian order.
    pub fn write_u16_le(&mut self, value: u16) -> Result<(), Error> {
        self.write_slice(&value.to_le_bytes())
    }

    /// Exposes the unwritten tail of the buffer.
    ///
    /// Attribute value reads copy straight into this region; the caller accounts for the octets
    /// afterwards with [`skip`].
    ///
    /// [`skip`]: ByteWriter::skip
    pub fn rest(&mut self) -> &mut [u8] {
        self.0
    }

    /// Marks the next `n` octets as produced without writing them.
    ///
    /// Anything not filled in through [`rest`] beforehand keeps whatever the buffer held.
    ///
    /// [`rest`]: ByteWriter::rest
    pub fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.bump(n).map(|_| ())
    }
}

/// Takes a received PDU apart, front to back.
///
/// Consuming more octets than the PDU carries reports [`Error::Eof`], which the handlers turn
/// into the appropriate ATT error; the reader's position is unspecified after a failure.
pub struct ByteReader<'a>(&'a [u8]);

impl<'a> ByteReader<'a> {
    /// Creates a reader consuming `octets`.
    pub fn new(octets: &'a [u8]) -> Self {
        ByteReader(octets)
    }

    /// Returns the number of octets not yet consumed.
    ///
    /// Fields like the *Read By Type* type UUID are width-polymorphic; what width was sent
    /// follows from how many octets remain.
    pub fn bytes_left(&self) -> usize {
        self.0.len()
    }

    /// Consumes the next `n` octets.
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if n > self.0.len() {
            return Err(Error::Eof);
        }

        let (consumed, rest) = self.0.split_at(n);
        self.0 = rest;
        Ok(consumed)
    }

    /// Consumes a fixed-width field into an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut field = [0; N];
        field.copy_from_slice(self.take(N)?);
        Ok(field)
    }

    /// Consumes a 16-bit little-endian field (handles, offsets, the client's MTU).
    pub fn read_u16_le(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Consumes the octets of a `zerocopy` layout and reinterprets them in place.
    pub fn read_obj<T: zerocopy::FromBytes + zerocopy::Unaligned>(
        &mut self,
    ) -> Result<&'a T, Error> {
        let (obj, rest) =
            LayoutVerified::<&[u8], T>::new_unaligned_from_prefix(self.0).ok_or(Error::Eof)?;
        self.0 = rest;
        Ok(obj.into_ref())
    }
}

/// Serialization into an in-progress PDU.
pub trait ToBytes {
    /// Appends the wire encoding of `self` to `writer`.
    ///
    /// `Error::Eof` means the value did not fit. Octets may have been partially produced by then;
    /// handlers that must not emit a torn tuple check [`ByteWriter::space_left`] first.
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error>;
}

/// Deserialization of a field from a received PDU.
pub trait FromBytes<'a>: Sized {
    /// Consumes the octets encoding a `Self` from the front of `bytes`.
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error>;
}
