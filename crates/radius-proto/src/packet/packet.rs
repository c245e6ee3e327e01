use super::Code;
use crate::attributes::{Attribute, AttributeType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Invalid packet length: {0}")]
    InvalidLength(usize),
    #[error("Attribute error: {0}")]
    AttributeError(String),
    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),
    #[error("Password too long: {0} bytes (max 128)")]
    PasswordTooLong(usize),
}

/// RADIUS packet (RFC 2865 Section 3)
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Code      |  Identifier   |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Authenticator                         |
/// |                          (16 octets)                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Attributes ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone)]
pub struct Packet {
    pub code: Code,
    /// Matches a reply to its request
    pub identifier: u8,
    pub authenticator: [u8; 16],
    pub attributes: Vec<Attribute>,
}

impl Packet {
    pub const HEADER_LENGTH: usize = 20;
    pub const MAX_PACKET_SIZE: usize = 4096;

    pub fn new(code: Code, identifier: u8, authenticator: [u8; 16]) -> Self {
        Packet {
            code,
            identifier,
            authenticator,
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    /// Bytes of everything after the header, in wire order
    pub fn encode_attributes(&self) -> Result<Vec<u8>, PacketError> {
        let mut buffer = Vec::new();
        for attr in &self.attributes {
            attr.encode_into(&mut buffer)?;
        }
        Ok(buffer)
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let attributes = self.encode_attributes()?;
        let total_length = Self::HEADER_LENGTH + attributes.len();
        if total_length > Self::MAX_PACKET_SIZE {
            return Err(PacketError::PacketTooLarge(total_length));
        }

        let mut buffer = Vec::with_capacity(total_length);
        buffer.push(self.code.as_u8());
        buffer.push(self.identifier);
        buffer.extend_from_slice(&(total_length as u16).to_be_bytes());
        buffer.extend_from_slice(&self.authenticator);
        buffer.extend_from_slice(&attributes);
        Ok(buffer)
    }

    /// Decode a packet, ignoring any padding past the declared length
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < Self::HEADER_LENGTH {
            return Err(PacketError::InvalidLength(data.len()));
        }

        let code = Code::from_u8(data[0]);
        let identifier = data[1];
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;

        if !(Self::HEADER_LENGTH..=Self::MAX_PACKET_SIZE).contains(&length) || data.len() < length {
            return Err(PacketError::InvalidLength(length));
        }

        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&data[4..Self::HEADER_LENGTH]);

        let mut attributes = Vec::new();
        let mut rest = &data[Self::HEADER_LENGTH..length];
        while !rest.is_empty() {
            let attr = Attribute::decode(rest)?;
            rest = &rest[attr.encoded_length()..];
            attributes.push(attr);
        }

        Ok(Packet {
            code,
            identifier,
            authenticator,
            attributes,
        })
    }

    pub fn length(&self) -> usize {
        Self::HEADER_LENGTH
            + self
                .attributes
                .iter()
                .map(Attribute::encoded_length)
                .sum::<usize>()
    }

    pub fn find_attribute(&self, attr_type: AttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is(attr_type))
    }

    pub fn find_all_attributes(&self, attr_type: AttributeType) -> Vec<&Attribute> {
        self.attributes.iter().filter(|a| a.is(attr_type)).collect()
    }
}
