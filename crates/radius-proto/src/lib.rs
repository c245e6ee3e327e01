//! RADIUS Protocol Implementation
//!
//! The subset of RFC 2865 an authenticating client needs: building an
//! Access-Request with a hidden User-Password, and decoding and verifying the
//! Access-Accept, Access-Reject or Access-Challenge that answers it.
//!
//! # Example
//!
//! ```rust
//! use radius_proto::{Attribute, AttributeType, Code, Packet};
//! use radius_proto::auth::{encrypt_user_password, generate_request_authenticator};
//!
//! let req_auth = generate_request_authenticator();
//! let mut packet = Packet::new(Code::AccessRequest, 1, req_auth);
//!
//! packet.add_attribute(Attribute::string(AttributeType::UserName, "alice").unwrap());
//! packet.add_attribute(Attribute::string(AttributeType::NasIdentifier, "privacyIDEA").unwrap());
//!
//! let hidden = encrypt_user_password(b"123456", b"secret", &req_auth).unwrap();
//! packet.add_attribute(Attribute::new(AttributeType::UserPassword as u8, hidden).unwrap());
//!
//! let bytes = packet.encode().unwrap();
//! assert_eq!(bytes.len(), packet.length());
//! ```

pub mod attributes;
pub mod auth;
pub mod packet;

pub use attributes::{Attribute, AttributeType};
pub use auth::{
    calculate_response_authenticator, decrypt_user_password, encrypt_user_password,
    generate_request_authenticator, verify_response_authenticator,
};
pub use packet::{Code, Packet, PacketError};
