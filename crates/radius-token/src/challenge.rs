//! Challenge records and their persistence collaborator

use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A challenge handed to the user, waiting for its response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Serial of the owning token
    pub serial: String,
    pub transaction_id: String,
    /// RADIUS continuation state or a sentinel, see `ServerState::to_data`
    pub data: Option<String>,
    /// Text shown to the user
    pub challenge: String,
    pub timestamp: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    /// Number of responses received so far
    pub received_count: u32,
    /// Whether the last response was correct
    pub otp_valid: bool,
}

impl Challenge {
    pub fn new(
        serial: impl Into<String>,
        transaction_id: impl Into<String>,
        data: Option<String>,
        challenge: impl Into<String>,
        validity_secs: u64,
    ) -> Self {
        let timestamp = Utc::now();
        let validity = i64::try_from(validity_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Challenge {
            serial: serial.into(),
            transaction_id: transaction_id.into(),
            data,
            challenge: challenge.into(),
            timestamp,
            expiration: timestamp
                .checked_add_signed(validity)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            received_count: 0,
            otp_valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.timestamp <= now && now < self.expiration
    }

    /// Validity window in whole seconds
    pub fn validity_secs(&self) -> i64 {
        (self.expiration - self.timestamp).num_seconds()
    }
}

/// Persistence for challenge records
///
/// Records are keyed by token serial and transaction id. `delete` and
/// `set_otp_status` on a record that no longer exists succeed silently, so
/// concurrent attempts consuming the same challenge never fail each other.
pub trait ChallengeStore: Send + Sync {
    /// Insert or replace a record
    fn save(&self, challenge: Challenge) -> Result<(), StoreError>;

    /// All records for this serial and transaction id, valid or not
    fn find(&self, serial: &str, transaction_id: &str) -> Result<Vec<Challenge>, StoreError>;

    fn delete(&self, serial: &str, transaction_id: &str) -> Result<(), StoreError>;

    /// Count one more response and remember whether it was correct
    fn set_otp_status(&self, serial: &str, transaction_id: &str, valid: bool) -> Result<(), StoreError>;

    /// Remove expired records of a token, returning how many went
    fn janitor_sweep(&self, serial: &str) -> Result<usize, StoreError>;
}

/// In-memory challenge store
///
/// Suitable for a single process; records vanish on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryChallengeStore {
    challenges: Arc<DashMap<(String, String), Challenge>>,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, serial: &str, transaction_id: &str) -> Option<Challenge> {
        self.challenges
            .get(&(serial.to_string(), transaction_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Number of stored records, expired ones included
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

impl ChallengeStore for MemoryChallengeStore {
    fn save(&self, challenge: Challenge) -> Result<(), StoreError> {
        let key = (challenge.serial.clone(), challenge.transaction_id.clone());
        self.challenges.insert(key, challenge);
        Ok(())
    }

    fn find(&self, serial: &str, transaction_id: &str) -> Result<Vec<Challenge>, StoreError> {
        Ok(self.get(serial, transaction_id).into_iter().collect())
    }

    fn delete(&self, serial: &str, transaction_id: &str) -> Result<(), StoreError> {
        self.challenges
            .remove(&(serial.to_string(), transaction_id.to_string()));
        Ok(())
    }

    fn set_otp_status(&self, serial: &str, transaction_id: &str, valid: bool) -> Result<(), StoreError> {
        if let Some(mut entry) = self
            .challenges
            .get_mut(&(serial.to_string(), transaction_id.to_string()))
        {
            entry.received_count += 1;
            entry.otp_valid = valid;
        }
        Ok(())
    }

    fn janitor_sweep(&self, serial: &str) -> Result<usize, StoreError> {
        let now = Utc::now();
        let before = self.challenges.len();
        self.challenges
            .retain(|(owner, _), challenge| owner != serial || now < challenge.expiration);
        let removed = before.saturating_sub(self.challenges.len());
        if removed > 0 {
            debug!(serial = %serial, removed = removed, "Swept expired challenges");
        }
        Ok(removed)
    }
}
