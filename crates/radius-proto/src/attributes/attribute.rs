use super::AttributeType;
use crate::packet::PacketError;

/// A single type-length-value attribute (RFC 2865 Section 5)
///
/// ```text
///  0                   1                   2
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type      |    Length     |  Value ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The type is kept as a raw byte so that replies carrying attributes this
/// crate has no name for still decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: u8,
    pub value: Vec<u8>,
}

impl Attribute {
    /// Type and length octets
    pub const HEADER_LENGTH: usize = 2;
    /// Largest encoded attribute
    pub const MAX_LENGTH: usize = 255;
    /// Largest value that still fits in one attribute
    pub const MAX_VALUE_LENGTH: usize = Self::MAX_LENGTH - Self::HEADER_LENGTH;

    pub fn new(attr_type: u8, value: Vec<u8>) -> Result<Self, PacketError> {
        if value.len() > Self::MAX_VALUE_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "value of attribute {} is {} bytes (max {})",
                attr_type,
                value.len(),
                Self::MAX_VALUE_LENGTH
            )));
        }
        Ok(Attribute { attr_type, value })
    }

    /// Text attribute such as User-Name or NAS-Identifier
    pub fn string(attr_type: AttributeType, value: impl Into<String>) -> Result<Self, PacketError> {
        Self::new(attr_type.as_u8(), value.into().into_bytes())
    }

    /// Opaque octet attribute such as State
    pub fn octets(attr_type: AttributeType, value: &[u8]) -> Result<Self, PacketError> {
        Self::new(attr_type.as_u8(), value.to_vec())
    }

    pub fn encode_into(&self, buffer: &mut Vec<u8>) -> Result<(), PacketError> {
        let length = self.encoded_length();
        if length > Self::MAX_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "encoded attribute {} is {} bytes",
                self.attr_type, length
            )));
        }
        buffer.push(self.attr_type);
        buffer.push(length as u8);
        buffer.extend_from_slice(&self.value);
        Ok(())
    }

    /// Decode one attribute from the front of `data`
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let [attr_type, length, ..] = *data else {
            return Err(PacketError::AttributeError(format!(
                "attribute header truncated: {} bytes",
                data.len()
            )));
        };
        let length = length as usize;

        if length < Self::HEADER_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "invalid attribute length {}",
                length
            )));
        }
        if data.len() < length {
            return Err(PacketError::AttributeError(format!(
                "attribute {} claims {} bytes, only {} left",
                attr_type,
                length,
                data.len()
            )));
        }

        Ok(Attribute {
            attr_type,
            value: data[Self::HEADER_LENGTH..length].to_vec(),
        })
    }

    pub fn encoded_length(&self) -> usize {
        Self::HEADER_LENGTH + self.value.len()
    }

    pub fn is(&self, attr_type: AttributeType) -> bool {
        self.attr_type == attr_type.as_u8()
    }

    /// Interpret the value as UTF-8 text
    pub fn as_string(&self) -> Result<String, PacketError> {
        String::from_utf8(self.value.clone())
            .map_err(|e| PacketError::AttributeError(format!("attribute {} is not UTF-8: {}", self.attr_type, e)))
    }
}
