use std::fmt;

/// RADIUS packet codes used by an authenticating client (RFC 2865 Section 4)
///
/// Codes a client never acts on are kept as `Other` so that a reply carrying
/// one can still be authenticated and turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// Access-Request (1)
    AccessRequest,
    /// Access-Accept (2)
    AccessAccept,
    /// Access-Reject (3)
    AccessReject,
    /// Access-Challenge (11)
    AccessChallenge,
    Other(u8),
}

impl Code {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Code::AccessRequest,
            2 => Code::AccessAccept,
            3 => Code::AccessReject,
            11 => Code::AccessChallenge,
            other => Code::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Code::AccessRequest => 1,
            Code::AccessAccept => 2,
            Code::AccessReject => 3,
            Code::AccessChallenge => 11,
            Code::Other(value) => value,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::AccessRequest => f.write_str("Access-Request"),
            Code::AccessAccept => f.write_str("Access-Accept"),
            Code::AccessReject => f.write_str("Access-Reject"),
            Code::AccessChallenge => f.write_str("Access-Challenge"),
            Code::Other(value) => write!(f, "Code({})", value),
        }
    }
}
