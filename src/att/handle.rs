//! Attribute handles.

use {
    crate::{
        att::{AttError, ErrorCode},
        bytes::*,
        Error,
    },
    core::fmt,
    zerocopy::byteorder::{LittleEndian, U16},
};

/// A 16-bit handle uniquely identifying an attribute on an ATT server.
///
/// The `0x0000` handle (`NULL`) is invalid and must not be used.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Handle(u16);

impl Handle {
    /// The `0x0000` handle is not used for actual attributes, but as a special placeholder when no
    /// attribute handle is valid (eg. in error responses).
    pub const NULL: Self = Handle(0x0000);

    /// Create an attribute handle from a raw u16.
    pub fn from_raw(raw: u16) -> Self {
        Handle(raw)
    }

    /// Returns the raw 16-bit integer representing this handle.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the handle of the immediately following attribute.
    pub fn next(&self) -> Handle {
        Handle(self.0 + 1)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl defmt::Format for Handle {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "0x{=u16:04x}", self.0);
    }
}

impl FromBytes<'_> for Handle {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(Handle(bytes.read_u16_le()?))
    }
}

/// Raw encoding of the starting/ending handle pair carried by range requests.
#[derive(zerocopy::FromBytes, zerocopy::Unaligned)]
#[repr(C)]
struct RawRange {
    start: U16<LittleEndian>,
    end: U16<LittleEndian>,
}

/// A (de)serializable handle range that isn't checked for validity.
#[derive(Debug, Copy, Clone)]
pub struct RawHandleRange {
    start: Handle,
    end: Handle,
}

impl RawHandleRange {
    /// Checks that this handle range is valid according to the Bluetooth spec.
    ///
    /// Returns an `AttError` that should be sent as a response if the range is invalid.
    pub fn check(&self) -> Result<HandleRange, AttError> {
        if self.start.0 > self.end.0 || self.start.0 == 0 {
            Err(AttError::new(ErrorCode::InvalidHandle, self.start))
        } else {
            Ok(HandleRange {
                start: self.start,
                end: self.end,
            })
        }
    }
}

impl FromBytes<'_> for RawHandleRange {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        let raw = bytes.read_obj::<RawRange>()?;
        Ok(Self {
            start: Handle(raw.start.get()),
            end: Handle(raw.end.get()),
        })
    }
}

/// A handle range that has been checked for validity.
#[derive(Debug, Copy, Clone)]
pub struct HandleRange {
    start: Handle,
    end: Handle,
}

impl HandleRange {
    /// Checks if `handle` is contained in `self`.
    pub fn contains(&self, handle: Handle) -> bool {
        self.start.0 <= handle.0 && handle.0 <= self.end.0
    }

    pub fn start(&self) -> Handle {
        self.start
    }

    pub fn end(&self) -> Handle {
        self.end
    }

    /// Iterates over the raw handle values in `self`, clamped to `last`.
    pub fn handles(&self, last: Handle) -> impl Iterator<Item = Handle> {
        let end = self.end.0.min(last.0);
        (self.start.0..=end).map(Handle)
    }
}
