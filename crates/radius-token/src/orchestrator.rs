//! Challenge lifecycle on top of the RADIUS bridge
//!
//! A challenge record remembers the server's continuation state under a
//! transaction id. A later request carrying the same transaction id replays
//! that state through the bridge.

use crate::bridge::RadiusBridge;
use crate::challenge::{Challenge, ChallengeStore};
use crate::context::{AttemptContext, ServerState};
use crate::error::StoreError;
use crate::token::Token;
use crate::verdict::Verdict;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_CHALLENGE_MESSAGE: &str = "Enter your RADIUS tokencode:";
pub const TRANSACTION_ID_LENGTH: usize = 20;

/// Random numeric transaction id
pub fn generate_transaction_id() -> String {
    let mut rng = rand::rng();
    (0..TRANSACTION_ID_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Result of creating a challenge, as handed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedChallenge {
    pub ok: bool,
    pub message: String,
    pub transaction_id: String,
    /// Extra output attributes; carries `state` = transaction id
    pub attributes: BTreeMap<String, String>,
}

pub struct ChallengeOrchestrator {
    store: Arc<dyn ChallengeStore>,
    bridge: Arc<RadiusBridge>,
}

impl ChallengeOrchestrator {
    pub fn new(store: Arc<dyn ChallengeStore>, bridge: Arc<RadiusBridge>) -> Self {
        ChallengeOrchestrator { store, bridge }
    }

    pub fn bridge(&self) -> &Arc<RadiusBridge> {
        &self.bridge
    }

    /// Persist a challenge for the state the last exchange left in `ctx`
    pub fn create_challenge(
        &self,
        token: &Token,
        transaction_id: Option<&str>,
        ctx: &AttemptContext,
    ) -> Result<CreatedChallenge, StoreError> {
        let transaction_id = transaction_id
            .filter(|tx| !tx.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_transaction_id);
        let message = ctx
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_CHALLENGE_MESSAGE.to_string());
        let validity = self.bridge.config().challenge_validity();

        let challenge = Challenge::new(
            token.serial.as_str(),
            transaction_id.as_str(),
            ctx.server_state.as_ref().map(ServerState::to_data),
            message.as_str(),
            validity,
        );
        self.store.save(challenge)?;
        info!(
            serial = %token.serial,
            transaction_id = %transaction_id,
            validity = validity,
            "Challenge created"
        );

        self.sweep(token);

        let mut attributes = BTreeMap::new();
        attributes.insert("state".to_string(), transaction_id.clone());

        Ok(CreatedChallenge {
            ok: true,
            message,
            transaction_id,
            attributes,
        })
    }

    /// Whether `passw` answers a pending challenge of this token
    ///
    /// The answer is checked against the server right away, so the verdict is
    /// cached in `ctx` for the following `check_challenge_response`. A reply
    /// that challenges again retires the old record.
    pub fn is_challenge_response(&self, token: &Token, passw: &str, ctx: &mut AttemptContext) -> bool {
        // First step of the chain: nothing cached may survive from earlier
        ctx.reset_verdict();

        let Some(transaction_id) = ctx.transaction_id.clone().filter(|tx| !tx.is_empty()) else {
            return false;
        };

        let challenges = match self.store.find(&token.serial, &transaction_id) {
            Ok(challenges) => challenges,
            Err(e) => {
                warn!(serial = %token.serial, error = %e, "Cannot read challenges");
                return false;
            }
        };

        let mut is_response = false;
        for challenge in challenges.iter().filter(|c| c.is_valid()) {
            let saved = challenge.data.as_deref().map(ServerState::from_data);
            match self.bridge.check_radius(token, passw, ctx, saved.as_ref()) {
                Verdict::Challenge => {
                    debug!(
                        serial = %token.serial,
                        transaction_id = %transaction_id,
                        "Challenged again, retiring old challenge"
                    );
                    self.delete(token, &transaction_id);
                    self.sweep(token);
                }
                _ => is_response = true,
            }
        }

        is_response
    }

    /// Verify `passw` as the answer to a pending challenge
    ///
    /// An accepted answer consumes the challenge. A wrong one only counts
    /// against it.
    pub fn check_challenge_response(&self, token: &Token, passw: &str, ctx: &mut AttemptContext) -> Verdict {
        let mut verdict = Verdict::Reject;

        if let Some(transaction_id) = ctx.transaction_id.clone().filter(|tx| !tx.is_empty()) {
            let challenges = self
                .store
                .find(&token.serial, &transaction_id)
                .unwrap_or_else(|e| {
                    warn!(serial = %token.serial, error = %e, "Cannot read challenges");
                    Vec::new()
                });

            for challenge in challenges.iter().filter(|c| c.is_valid()) {
                let saved = challenge.data.as_deref().map(ServerState::from_data);
                if self.bridge.check_radius(token, passw, ctx, saved.as_ref()) == Verdict::Accept {
                    self.delete(token, &transaction_id);
                    verdict = Verdict::Accept;
                    break;
                }
                if let Err(e) = self.store.set_otp_status(&token.serial, &transaction_id, false) {
                    warn!(serial = %token.serial, error = %e, "Cannot update challenge");
                }
            }
        }

        self.sweep(token);
        verdict
    }

    fn delete(&self, token: &Token, transaction_id: &str) {
        if let Err(e) = self.store.delete(&token.serial, transaction_id) {
            warn!(serial = %token.serial, transaction_id = %transaction_id, error = %e, "Cannot delete challenge");
        }
    }

    fn sweep(&self, token: &Token) {
        if let Err(e) = self.store.janitor_sweep(&token.serial) {
            warn!(serial = %token.serial, error = %e, "Challenge janitor failed");
        }
    }
}
