//! Per-attempt result cache
//!
//! One [`AttemptContext`] lives for exactly one authentication call chain. The
//! adapter, orchestrator and bridge all thread it by `&mut` so that a verdict
//! obtained early in the chain is reused instead of re-contacting the server.
//! It is never persisted or shared between chains.

use crate::verdict::Verdict;

/// Challenge data value meaning "this attempt already got Access-Accept"
pub const SUCCESS_SENTINEL: &str = "<SUCCESS>";
/// Challenge data value meaning "this attempt already got Access-Reject"
pub const REJECTED_SENTINEL: &str = "<REJECTED>";

/// What the server left behind after the last exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    /// Opaque State attribute from an Access-Challenge
    Radius(Vec<u8>),
    /// The exchange already ended in Access-Accept
    Success,
    /// The exchange already ended in a rejection
    Rejected,
}

impl ServerState {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, ServerState::Success | ServerState::Rejected)
    }

    /// Raw State bytes to echo back to the server, if any
    pub fn as_radius(&self) -> Option<&[u8]> {
        match self {
            ServerState::Radius(state) => Some(state),
            _ => None,
        }
    }

    /// Encode for the challenge record's `data` field
    pub fn to_data(&self) -> String {
        match self {
            ServerState::Success => SUCCESS_SENTINEL.to_string(),
            ServerState::Rejected => REJECTED_SENTINEL.to_string(),
            ServerState::Radius(state) => encode_hex(state),
        }
    }

    /// Decode a challenge record's `data` field
    ///
    /// Data that is not hex (written by another tool) is taken verbatim.
    pub fn from_data(data: &str) -> Self {
        match data {
            SUCCESS_SENTINEL => ServerState::Success,
            REJECTED_SENTINEL => ServerState::Rejected,
            other => ServerState::Radius(
                decode_hex(other).unwrap_or_else(|| other.as_bytes().to_vec()),
            ),
        }
    }
}

/// Typed attempt-scoped cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptContext {
    /// Last verdict obtained in this attempt; authoritative once set
    pub verdict: Option<Verdict>,
    /// State left by the last exchange
    pub server_state: Option<ServerState>,
    /// Reply-Message or outcome text from the last exchange
    pub message: Option<String>,
    /// Transaction id the client sent with this request
    pub transaction_id: Option<String>,
}

impl AttemptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a request that answers an earlier challenge
    pub fn for_transaction(transaction_id: impl Into<String>) -> Self {
        AttemptContext {
            transaction_id: Some(transaction_id.into()),
            ..Self::default()
        }
    }

    pub fn cached_verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    /// Forget the verdict so the next check goes to the network
    pub fn reset_verdict(&mut self) {
        self.verdict = None;
    }

    /// Drop the server state and message
    pub fn clear_state(&mut self) {
        self.server_state = None;
        self.message = None;
    }

    /// Store the result of an exchange
    pub fn record(&mut self, verdict: Verdict, state: Option<ServerState>, message: Option<String>) {
        self.verdict = Some(verdict);
        self.server_state = state;
        self.message = message;
    }
}

pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub(crate) fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() || text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| text.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
