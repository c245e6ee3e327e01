/// RADIUS attribute types exchanged during PAP authentication (RFC 2865 Section 5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeType {
    /// User-Name (1)
    UserName = 1,
    /// User-Password (2)
    UserPassword = 2,
    /// NAS-IP-Address (4)
    NasIpAddress = 4,
    /// Reply-Message (18)
    ReplyMessage = 18,
    /// State (24), opaque continuation handed out with Access-Challenge
    State = 24,
    /// Class (25)
    Class = 25,
    /// Session-Timeout (27)
    SessionTimeout = 27,
    /// NAS-Identifier (32)
    NasIdentifier = 32,
    /// Proxy-State (33)
    ProxyState = 33,
}

impl AttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AttributeType::UserName),
            2 => Some(AttributeType::UserPassword),
            4 => Some(AttributeType::NasIpAddress),
            18 => Some(AttributeType::ReplyMessage),
            24 => Some(AttributeType::State),
            25 => Some(AttributeType::Class),
            27 => Some(AttributeType::SessionTimeout),
            32 => Some(AttributeType::NasIdentifier),
            33 => Some(AttributeType::ProxyState),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
