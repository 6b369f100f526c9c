//! Per-connection server state.
//!
//! The transport owns one [`Connection`] per established link and passes it to
//! [`AttributeServer::l2cap_input`]. The server never retains references into it across calls, so
//! the transport is free to place it wherever connection storage lives and to drop it when the
//! link goes down.
//!
//! [`AttributeServer::l2cap_input`]: crate::att::AttributeServer::l2cap_input

use crate::att::DEFAULT_ATT_MTU;
use core::cmp;

/// Client Characteristic Configuration bit: notifications enabled.
pub const CCCD_NOTIFICATION: u8 = 0x01;

/// Client Characteristic Configuration bit: indications enabled.
pub const CCCD_INDICATION: u8 = 0x02;

/// State kept for each connected client.
///
/// `CONFIGS` is the number of notify/indicate-capable characteristics in the database (see
/// [`Database::client_config_count`]); each gets one Client Characteristic Configuration slot
/// that starts out with everything disabled.
///
/// [`Database::client_config_count`]: crate::gatt::Database::client_config_count
pub struct Connection<const CONFIGS: usize> {
    server_mtu: u16,
    client_mtu: u16,
    configs: [u8; CONFIGS],
}

impl<const CONFIGS: usize> Connection<CONFIGS> {
    /// Creates the state for a freshly established connection.
    ///
    /// `server_mtu` is the largest ATT PDU this server can produce and must be at least
    /// [`DEFAULT_ATT_MTU`].
    pub fn new(server_mtu: u16) -> Self {
        assert!(server_mtu >= DEFAULT_ATT_MTU);
        Self {
            server_mtu,
            client_mtu: DEFAULT_ATT_MTU,
            configs: [0; CONFIGS],
        }
    }

    /// Returns the MTU in effect for this connection.
    ///
    /// Every response PDU is clamped to this size.
    pub fn negotiated_mtu(&self) -> u16 {
        cmp::min(self.server_mtu, self.client_mtu)
    }

    /// Returns the MTU this server announced when the connection was created.
    pub fn server_mtu(&self) -> u16 {
        self.server_mtu
    }

    /// Returns the MTU last announced by the client (23 until an *Exchange MTU Request* arrives).
    pub fn client_mtu(&self) -> u16 {
        self.client_mtu
    }

    pub(crate) fn set_client_mtu(&mut self, mtu: u16) {
        debug_assert!(mtu >= DEFAULT_ATT_MTU);
        self.client_mtu = mtu;
    }

    /// Returns the client characteristic configuration slots for access by the database.
    pub fn client_configs(&mut self) -> ClientConfigs<'_> {
        ClientConfigs(&mut self.configs)
    }

    /// Returns whether the client has enabled notifications on configuration slot `slot`.
    pub fn notifications_enabled(&self, slot: usize) -> bool {
        self.configs
            .get(slot)
            .map_or(false, |c| c & CCCD_NOTIFICATION != 0)
    }
}

/// Borrowed view of a connection's CCCD slots, independent of the slot count.
pub struct ClientConfigs<'a>(&'a mut [u8]);

impl ClientConfigs<'_> {
    /// Reads the configuration bits of `slot` (0 for slots beyond the connection's storage).
    pub fn get(&self, slot: usize) -> u8 {
        self.0.get(slot).copied().unwrap_or(0)
    }

    /// Stores the configuration bits of `slot`, masked to the two defined bits.
    pub fn set(&mut self, slot: usize, flags: u8) {
        debug_assert!(slot < self.0.len());
        if let Some(config) = self.0.get_mut(slot) {
            *config = flags & (CCCD_NOTIFICATION | CCCD_INDICATION);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtu_negotiation() {
        let mut conn = Connection::<0>::new(120);
        assert_eq!(conn.negotiated_mtu(), 23);

        conn.set_client_mtu(80);
        assert_eq!(conn.negotiated_mtu(), 80);

        conn.set_client_mtu(517);
        assert_eq!(conn.negotiated_mtu(), 120);
    }

    #[test]
    fn config_bits() {
        let mut conn = Connection::<2>::new(23);
        assert!(!conn.notifications_enabled(0));

        conn.client_configs().set(0, 0xff);
        assert_eq!(conn.client_configs().get(0), 0x03);
        assert!(conn.notifications_enabled(0));
        assert!(!conn.notifications_enabled(1));
        assert!(!conn.notifications_enabled(7));
    }
}
