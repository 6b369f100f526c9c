use {
    crate::att::{AttUuid, AttributeAccessPermissions, ValueAccess},
    crate::uuid::Uuid16,
    bitflags::bitflags,
};

bitflags! {
    /// Characteristic properties, as advertised in the characteristic declaration.
    ///
    /// These tell the client what it may attempt; the actual access decision is made per request
    /// by the value attribute's permissions.
    pub struct Properties: u8 {
        const BROADCAST    = 0x01;
        const READ         = 0x02;
        const WRITE_NO_RSP = 0x04;
        const WRITE        = 0x08;
        const NOTIFY       = 0x10;
        const INDICATE     = 0x20;
        const AUTH_WRITES  = 0x40;
        const EXTENDED     = 0x80;
    }
}

/// A descriptor with fixed content, eg. a Characteristic User Description.
///
/// The octets are served read-only; clients cannot write them.
pub struct Descriptor<'a> {
    pub uuid: Uuid16,
    pub value: &'a [u8],
}

/// A characteristic: a typed value bound to application storage, plus the configuration that
/// controls how clients may use it.
///
/// In the attribute database, every characteristic contributes its declaration attribute,
/// immediately followed by the value attribute, followed by a Client Characteristic Configuration
/// descriptor when `client_config` is set, followed by the `descriptors`.
pub struct Characteristic<'a> {
    pub uuid: AttUuid,
    pub value: &'a dyn ValueAccess,
    pub permissions: AttributeAccessPermissions,
    pub properties: Properties,
    pub client_config: bool,
    pub descriptors: &'a [Descriptor<'a>],
}

impl<'a> Characteristic<'a> {
    /// Creates a characteristic that is readable and writeable, with no descriptors.
    pub fn new(uuid: impl Into<AttUuid>, value: &'a dyn ValueAccess) -> Self {
        Self {
            uuid: uuid.into(),
            value,
            permissions: AttributeAccessPermissions::ReadableAndWriteable,
            properties: Properties::READ | Properties::WRITE,
            client_config: false,
            descriptors: &[],
        }
    }

    /// Attaches fixed-content descriptors to the characteristic.
    pub fn with_descriptors(mut self, descriptors: &'a [Descriptor<'a>]) -> Self {
        self.descriptors = descriptors;
        self
    }

    /// Removes client read access.
    pub fn no_read_access(mut self) -> Self {
        self.permissions = AttributeAccessPermissions::Writeable;
        self.properties.remove(Properties::READ);
        self
    }

    /// Removes client write access.
    pub fn no_write_access(mut self) -> Self {
        self.permissions = AttributeAccessPermissions::Readable;
        self.properties.remove(Properties::WRITE);
        self
    }

    /// Allows clients to subscribe to value notifications.
    ///
    /// Adds a Client Characteristic Configuration descriptor behind the value attribute.
    pub fn notify(mut self) -> Self {
        self.properties.insert(Properties::NOTIFY);
        self.client_config = true;
        self
    }

    /// Allows clients to subscribe to value indications.
    ///
    /// Adds a Client Characteristic Configuration descriptor behind the value attribute. Note
    /// that the confirmation-ordered indication procedure itself is not implemented by this
    /// server; only the declaration surface is.
    pub fn indicate(mut self) -> Self {
        self.properties.insert(Properties::INDICATE);
        self.client_config = true;
        self
    }

    /// Number of attributes this characteristic occupies in the database.
    pub(crate) fn attribute_span(&self) -> u16 {
        2 + self.client_config as u16 + self.descriptors.len() as u16
    }
}
