//! Blocking RADIUS client transport
//!
//! The retry count and timeout are fixed at 3 attempts of 5 seconds each. A
//! check against an unreachable server blocks its caller for up to 15 seconds.

use crate::config::RadiusServerConfig;
use crate::error::TransportError;
use radius_proto::auth::{encrypt_user_password, generate_request_authenticator, verify_response_authenticator};
use radius_proto::{Attribute, AttributeType, Code, Packet};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the bridge asks the server
#[derive(Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub user_name: String,
    pub nas_identifier: String,
    /// Plain OTP value; hidden with the shared secret on the wire
    pub password: String,
    /// State attribute to echo back
    pub state: Option<Vec<u8>>,
}

impl std::fmt::Debug for AccessRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessRequest")
            .field("user_name", &self.user_name)
            .field("nas_identifier", &self.nas_identifier)
            .field("password_len", &self.password.len())
            .field("state", &self.state)
            .finish()
    }
}

/// The parts of a reply the bridge cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessReply {
    pub code: Code,
    pub state: Option<Vec<u8>>,
    /// Reply-Message attributes joined in order
    pub reply_message: Option<String>,
}

impl AccessReply {
    pub fn from_packet(packet: &Packet) -> Self {
        let messages: Vec<String> = packet
            .find_all_attributes(AttributeType::ReplyMessage)
            .into_iter()
            .filter_map(|attr| attr.as_string().ok())
            .collect();

        AccessReply {
            code: packet.code,
            state: packet
                .find_attribute(AttributeType::State)
                .map(|attr| attr.value.clone()),
            reply_message: (!messages.is_empty()).then(|| messages.concat()),
        }
    }
}

/// Sends one Access-Request and waits for the matching reply
pub trait RadiusTransport: Send + Sync {
    fn send(&self, server: &RadiusServerConfig, request: &AccessRequest) -> Result<AccessReply, TransportError>;
}

/// Build the wire packet for a request
pub fn build_access_request(
    request: &AccessRequest,
    secret: &[u8],
    identifier: u8,
) -> Result<Packet, TransportError> {
    let authenticator = generate_request_authenticator();
    let mut packet = Packet::new(Code::AccessRequest, identifier, authenticator);

    packet.add_attribute(Attribute::string(AttributeType::UserName, request.user_name.as_str())?);
    packet.add_attribute(Attribute::string(
        AttributeType::NasIdentifier,
        request.nas_identifier.as_str(),
    )?);

    let hidden = encrypt_user_password(request.password.as_bytes(), secret, &authenticator)?;
    packet.add_attribute(Attribute::new(AttributeType::UserPassword.as_u8(), hidden)?);

    if let Some(ref state) = request.state {
        packet.add_attribute(Attribute::octets(AttributeType::State, state)?);
    }

    Ok(packet)
}

/// UDP transport with the fixed retry policy
#[derive(Debug, Clone)]
pub struct UdpTransport {
    retries: u32,
    timeout: Duration,
}

impl Default for UdpTransport {
    fn default() -> Self {
        UdpTransport {
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn resolve(server: &RadiusServerConfig) -> Result<SocketAddr, TransportError> {
        (server.host.as_str(), server.port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Unresolvable(server.address()))?
            .next()
            .ok_or_else(|| TransportError::Unresolvable(server.address()))
    }

    /// Wait for a reply to `request` until `deadline`
    ///
    /// Datagrams with another identifier are stale retransmission answers and
    /// are skipped, as are undecodable or wrongly signed ones. `Ok(None)`
    /// means the deadline passed.
    fn await_reply(
        &self,
        socket: &UdpSocket,
        request: &Packet,
        secret: &[u8],
        server: &RadiusServerConfig,
        deadline: Instant,
    ) -> Result<Option<Packet>, TransportError> {
        let mut buffer = [0u8; Packet::MAX_PACKET_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            socket.set_read_timeout(Some(remaining))?;

            let len = match socket.recv(&mut buffer) {
                Ok(len) => len,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            let reply = match Packet::decode(&buffer[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    debug!(server = %server.address(), error = %e, "Dropping malformed datagram");
                    continue;
                }
            };
            if reply.identifier != request.identifier {
                debug!(
                    server = %server.address(),
                    expected = request.identifier,
                    got = reply.identifier,
                    "Ignoring reply with foreign identifier"
                );
                continue;
            }

            if !verify_response_authenticator(&reply, &request.authenticator, secret) {
                warn!(server = %server.address(), "Dropping reply with invalid response authenticator");
                continue;
            }
            return Ok(Some(reply));
        }
    }
}

impl RadiusTransport for UdpTransport {
    fn send(&self, server: &RadiusServerConfig, request: &AccessRequest) -> Result<AccessReply, TransportError> {
        let address = Self::resolve(server)?;
        let bind_addr: SocketAddr = if address.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(address)?;

        let packet = build_access_request(request, &server.secret, rand::random::<u8>())?;
        let bytes = packet.encode()?;

        for attempt in 1..=self.retries {
            socket.send(&bytes)?;
            debug!(
                server = %address,
                attempt = attempt,
                identifier = packet.identifier,
                "Access-Request sent"
            );

            let deadline = Instant::now() + self.timeout;
            if let Some(reply) = self.await_reply(&socket, &packet, &server.secret, server, deadline)? {
                return Ok(AccessReply::from_packet(&reply));
            }

            warn!(server = %address, attempt = attempt, "No reply from RADIUS server");
        }

        Err(TransportError::NoReply {
            server: server.address(),
            attempts: self.retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_proto::auth::{calculate_response_authenticator, decrypt_user_password};

    fn request(state: Option<&[u8]>) -> AccessRequest {
        AccessRequest {
            user_name: "alice".to_string(),
            nas_identifier: "privacyIDEA".to_string(),
            password: "123456".to_string(),
            state: state.map(<[u8]>::to_vec),
        }
    }

    #[test]
    fn test_fixed_policy() {
        let transport = UdpTransport::new();
        assert_eq!(transport.retries(), 3);
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_build_access_request() {
        let packet = build_access_request(&request(Some(b"srv-state")), b"secret", 9).unwrap();
        assert_eq!(packet.code, Code::AccessRequest);
        assert_eq!(packet.identifier, 9);

        let user = packet.find_attribute(AttributeType::UserName).unwrap();
        assert_eq!(user.as_string().unwrap(), "alice");
        let nas = packet.find_attribute(AttributeType::NasIdentifier).unwrap();
        assert_eq!(nas.as_string().unwrap(), "privacyIDEA");
        let state = packet.find_attribute(AttributeType::State).unwrap();
        assert_eq!(state.value, b"srv-state");

        let hidden = packet.find_attribute(AttributeType::UserPassword).unwrap();
        assert_ne!(hidden.value, b"123456");
        let plain = decrypt_user_password(&hidden.value, b"secret", &packet.authenticator).unwrap();
        assert_eq!(plain, b"123456");
    }

    #[test]
    fn test_build_without_state() {
        let packet = build_access_request(&request(None), b"secret", 1).unwrap();
        assert!(packet.find_attribute(AttributeType::State).is_none());
    }

    #[test]
    fn test_reply_extraction() {
        let mut packet = Packet::new(Code::AccessChallenge, 3, [0u8; 16]);
        packet.add_attribute(Attribute::octets(AttributeType::State, b"abc").unwrap());
        packet.add_attribute(Attribute::string(AttributeType::ReplyMessage, "Enter ").unwrap());
        packet.add_attribute(Attribute::string(AttributeType::ReplyMessage, "code").unwrap());

        let reply = AccessReply::from_packet(&packet);
        assert_eq!(reply.code, Code::AccessChallenge);
        assert_eq!(reply.state.as_deref(), Some(&b"abc"[..]));
        assert_eq!(reply.reply_message.as_deref(), Some("Enter code"));

        let bare = AccessReply::from_packet(&Packet::new(Code::AccessAccept, 3, [0u8; 16]));
        assert_eq!(bare.state, None);
        assert_eq!(bare.reply_message, None);
    }

    #[test]
    fn test_debug_hides_password() {
        let printed = format!("{:?}", request(None));
        assert!(!printed.contains("123456"));
    }

    #[test]
    fn test_udp_round_trip_against_local_responder() {
        let responder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = responder.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            let (len, peer) = responder.recv_from(&mut buf).unwrap();
            let req = Packet::decode(&buf[..len]).unwrap();

            let mut reply = Packet::new(Code::AccessAccept, req.identifier, [0u8; 16]);
            reply.add_attribute(Attribute::string(AttributeType::ReplyMessage, "welcome").unwrap());
            reply.authenticator =
                calculate_response_authenticator(&reply, &req.authenticator, b"secret").unwrap();
            responder.send_to(&reply.encode().unwrap(), peer).unwrap();
        });

        let server = RadiusServerConfig::from_server_string(&format!("127.0.0.1:{port}"), b"secret".to_vec()).unwrap();
        let reply = UdpTransport::new().send(&server, &request(None)).unwrap();
        handle.join().unwrap();

        assert_eq!(reply.code, Code::AccessAccept);
        assert_eq!(reply.reply_message.as_deref(), Some("welcome"));
    }

    #[test]
    fn test_bad_datagrams_do_not_cancel_real_reply() {
        let responder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = responder.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            let (len, peer) = responder.recv_from(&mut buf).unwrap();
            let req = Packet::decode(&buf[..len]).unwrap();

            responder.send_to(&[2, req.identifier, 0], peer).unwrap();

            let mut forged = Packet::new(Code::AccessAccept, req.identifier, [0u8; 16]);
            forged.authenticator =
                calculate_response_authenticator(&forged, &req.authenticator, b"guess").unwrap();
            responder.send_to(&forged.encode().unwrap(), peer).unwrap();

            let mut reply = Packet::new(Code::Other(40), req.identifier, [0u8; 16]);
            reply.authenticator =
                calculate_response_authenticator(&reply, &req.authenticator, b"secret").unwrap();
            responder.send_to(&reply.encode().unwrap(), peer).unwrap();
        });

        let server = RadiusServerConfig::from_server_string(&format!("127.0.0.1:{port}"), b"secret".to_vec()).unwrap();
        let reply = UdpTransport::new().send(&server, &request(None)).unwrap();
        handle.join().unwrap();

        assert_eq!(reply.code, Code::Other(40));
    }
}
