//! Error types for enrollment, transport and token operations

use radius_proto::PacketError;
use thiserror::Error;

/// Parameter error id reported when enrollment has no way to reach a server
pub const MISSING_PARAMETER_ID: u32 = 905;

/// Setup and enrollment errors
///
/// These surface while a token is enrolled or the configuration is loaded.
/// During verification they are logged and collapse to a rejection.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
    #[error("Unknown RADIUS server identifier: {0}")]
    UnknownServer(String),
}

impl ConfigError {
    /// Numeric id for parameter errors, as the hosting API reports them
    pub fn id(&self) -> Option<u32> {
        match self {
            ConfigError::MissingParameter(_) => Some(MISSING_PARAMETER_ID),
            _ => None,
        }
    }
}

/// Failures talking to the RADIUS server
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("Cannot resolve RADIUS server address {0}")]
    Unresolvable(String),
    #[error("No reply from {server} after {attempts} attempts")]
    NoReply { server: String, attempts: u32 },
}

/// Errors from the challenge persistence collaborator
#[derive(Debug)]
pub enum StoreError {
    /// Store unreachable
    Unavailable(String),
    /// Record could not be encoded or decoded
    Serialization(String),
    /// Anything else the backend reports
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Challenge store unavailable: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StoreError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors the token surface hands back to the hosting framework
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token {0} is locked")]
    Locked(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
