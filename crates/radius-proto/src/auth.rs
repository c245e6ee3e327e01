use crate::packet::{Packet, PacketError};
use rand::Rng;

/// Longest User-Password RFC 2865 allows
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Generate a random Request Authenticator (RFC 2865 Section 3)
pub fn generate_request_authenticator() -> [u8; 16] {
    let mut authenticator = [0u8; 16];
    rand::rng().fill(&mut authenticator);
    authenticator
}

/// Calculate a Response Authenticator (RFC 2865 Section 3)
///
/// MD5(Code + ID + Length + Request Authenticator + Attributes + Secret)
pub fn calculate_response_authenticator(
    packet: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> Result<[u8; 16], PacketError> {
    let attributes = packet.encode_attributes()?;
    let length = (Packet::HEADER_LENGTH + attributes.len()) as u16;

    let mut context = md5::Context::new();
    context.consume([packet.code.as_u8(), packet.identifier]);
    context.consume(length.to_be_bytes());
    context.consume(request_authenticator);
    context.consume(&attributes);
    context.consume(secret);
    Ok(context.compute().0)
}

/// Check the authenticator of a reply against the request it answers
pub fn verify_response_authenticator(
    response: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> bool {
    calculate_response_authenticator(response, request_authenticator, secret)
        .map(|expected| expected == response.authenticator)
        .unwrap_or(false)
}

/// Hide a User-Password value (RFC 2865 Section 5.2)
///
/// The value is zero padded to a multiple of 16 octets. Each block is XORed
/// with MD5(secret + previous ciphertext block), seeded by the Request
/// Authenticator.
pub fn encrypt_user_password(
    password: &[u8],
    secret: &[u8],
    authenticator: &[u8; 16],
) -> Result<Vec<u8>, PacketError> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(PacketError::PasswordTooLong(password.len()));
    }

    let blocks = password.len().div_ceil(16).max(1);
    let mut padded = password.to_vec();
    padded.resize(blocks * 16, 0);

    let mut result = Vec::with_capacity(padded.len());
    let mut previous: [u8; 16] = *authenticator;

    for chunk in padded.chunks(16) {
        let mut context = md5::Context::new();
        context.consume(secret);
        context.consume(previous);
        let hash = context.compute().0;

        for (i, byte) in chunk.iter().enumerate() {
            previous[i] = byte ^ hash[i];
        }
        result.extend_from_slice(&previous);
    }

    Ok(result)
}

/// Reverse [`encrypt_user_password`], stripping the zero padding
pub fn decrypt_user_password(
    encrypted: &[u8],
    secret: &[u8],
    authenticator: &[u8; 16],
) -> Result<Vec<u8>, PacketError> {
    if encrypted.is_empty() || encrypted.len() % 16 != 0 {
        return Err(PacketError::AttributeError(format!(
            "encrypted password length {} is not a multiple of 16",
            encrypted.len()
        )));
    }

    let mut result = Vec::with_capacity(encrypted.len());
    let mut previous: &[u8] = authenticator;

    for chunk in encrypted.chunks(16) {
        let mut context = md5::Context::new();
        context.consume(secret);
        context.consume(previous);
        let hash = context.compute().0;

        result.extend(chunk.iter().zip(hash.iter()).map(|(c, h)| c ^ h));
        previous = chunk;
    }

    while result.last() == Some(&0) {
        result.pop();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Code;
    use crate::{Attribute, AttributeType};

    #[test]
    fn test_generate_authenticator() {
        assert_ne!(generate_request_authenticator(), generate_request_authenticator());
    }

    #[test]
    fn test_password_spanning_blocks() {
        let secret = b"sharedsecret";
        let authenticator = [7u8; 16];
        let password = b"123456-and-a-long-tail";

        let encrypted = encrypt_user_password(password, secret, &authenticator).unwrap();
        assert_eq!(encrypted.len(), 32);
        let decrypted = decrypt_user_password(&encrypted, secret, &authenticator).unwrap();
        assert_eq!(decrypted, password);
    }

    #[test]
    fn test_empty_password_is_one_block() {
        let encrypted = encrypt_user_password(b"", b"s", &[1u8; 16]).unwrap();
        assert_eq!(encrypted.len(), 16);
    }

    #[test]
    fn test_password_too_long() {
        let password = vec![b'a'; 129];
        assert!(matches!(
            encrypt_user_password(&password, b"s", &[0u8; 16]),
            Err(PacketError::PasswordTooLong(129))
        ));
    }

    #[test]
    fn test_response_authenticator() {
        let secret = b"sharedsecret";
        let request_auth = [1u8; 16];
        let mut packet = Packet::new(Code::AccessAccept, 42, [0u8; 16]);
        packet.add_attribute(Attribute::string(AttributeType::ReplyMessage, "ok").unwrap());

        packet.authenticator =
            calculate_response_authenticator(&packet, &request_auth, secret).unwrap();

        assert!(verify_response_authenticator(&packet, &request_auth, secret));
        assert!(!verify_response_authenticator(&packet, &request_auth, b"other"));
    }
}
