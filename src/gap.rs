//! Advertising Data assembly, part of GAP (Generic Access Profile).
//!
//! Also see the [assigned numbers document][gap] hosted by the SIG.
//!
//! [gap]: https://www.bluetooth.com/specifications/assigned-numbers/generic-access-profile

use bitflags::bitflags;

bitflags! {
    /// BR/EDR and LE compatibility flags.
    ///
    /// This is mandatory for most devices and can only be omitted if all flags are 0.
    pub struct Flags: u8 {
        const LE_LIMITED_DISCOVERABLE = 0b00000001;
        const LE_GENERAL_DISCOVERABLE = 0b00000010;
        const BR_EDR_NOT_SUPPORTED    = 0b00000100;
        const SIMUL_LE_BR_CONTROLLER  = 0b00001000;
        const SIMUL_LE_BR_HOST        = 0b00010000;
    }
}

impl Flags {
    /// Returns flags suitable for discoverable devices that want to establish a connection.
    ///
    /// The created `Flags` value specifies that this device is not BR/EDR (classic Bluetooth)
    /// capable and is in General Discoverable mode.
    pub fn discoverable() -> Flags {
        Self::BR_EDR_NOT_SUPPORTED | Self::LE_GENERAL_DISCOVERABLE
    }

    /// Returns the raw representation of the flags.
    pub fn to_u8(self) -> u8 {
        self.bits()
    }
}

/// AD structure type constants.
///
/// https://www.bluetooth.com/specifications/assigned-numbers/generic-access-profile
enum Type {}

impl Type {
    const FLAGS: u8 = 0x01;
    const SHORTENED_LOCAL_NAME: u8 = 0x08;
    const COMPLETE_LOCAL_NAME: u8 = 0x09;
}

/// Assembles the advertising payload for a connectable, discoverable server into `buffer`.
///
/// The payload starts with a Flags AD structure, followed by the device name if one is configured
/// and at least a 2-octet header plus one name octet still fit. A name that does not fit in full
/// is truncated and tagged as *Shortened Local Name* instead of *Complete Local Name*.
///
/// Returns the number of octets written. The caller provides the buffer, which for legacy
/// advertising is at most 31 octets; larger buffers simply leave the extra space unused.
pub fn advertising_data(name: Option<&str>, buffer: &mut [u8]) -> usize {
    let mut used = 0;

    if buffer.len() >= 3 {
        buffer[0] = 2;
        buffer[1] = Type::FLAGS;
        buffer[2] = Flags::discoverable().to_u8();
        used = 3;
    }

    if let Some(name) = name {
        let name = name.as_bytes();
        let space = buffer.len() - used;
        if !name.is_empty() && space > 2 {
            let len = name.len().min(space - 2);
            buffer[used] = len as u8 + 1;
            buffer[used + 1] = if len == name.len() {
                Type::COMPLETE_LOCAL_NAME
            } else {
                Type::SHORTENED_LOCAL_NAME
            };
            buffer[used + 2..used + 2 + len].copy_from_slice(&name[..len]);
            used += len + 2;
        }
    }

    used
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_only() {
        let mut buf = [0; 31];
        assert_eq!(advertising_data(None, &mut buf), 3);
        assert_eq!(buf[..3], [0x02, 0x01, 0x06]);
    }

    #[test]
    fn complete_name() {
        let mut buf = [0; 31];
        let len = advertising_data(Some("thermo"), &mut buf);
        assert_eq!(&buf[..len], b"\x02\x01\x06\x07\x09thermo");
    }

    #[test]
    fn name_is_shortened_to_fit() {
        let mut buf = [0; 12];
        let len = advertising_data(Some("a rather long name"), &mut buf);
        assert_eq!(len, 12);
        assert_eq!(&buf[3..5], &[8, 0x08]);
        assert_eq!(&buf[5..], b"a rathe");
    }

    #[test]
    fn tiny_buffers() {
        let mut buf = [0; 2];
        assert_eq!(advertising_data(Some("x"), &mut buf), 0);

        // Room for the flags but not for any part of the name.
        let mut buf = [0; 5];
        assert_eq!(advertising_data(Some("x"), &mut buf), 3);

        let mut buf = [0; 6];
        let len = advertising_data(Some("x"), &mut buf);
        assert_eq!(&buf[..len], &[0x02, 0x01, 0x06, 0x02, 0x09, b'x']);
    }
}
