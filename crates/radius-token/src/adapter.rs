//! The token surface the authentication framework drives
//!
//! Each call takes the attempt's [`AttemptContext`]; a verdict cached there by
//! an earlier call in the same attempt is reused instead of asking the server
//! again.

use crate::bridge::RadiusBridge;
use crate::context::AttemptContext;
use crate::error::TokenError;
use crate::orchestrator::{ChallengeOrchestrator, CreatedChallenge};
use crate::token::{PinPolicy, Token};
use crate::verdict::Verdict;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const WRONG_PIN_MESSAGE: &str = "Wrong PIN";
pub const MATCHED_MESSAGE: &str = "matching 1 tokens";
pub const UNEXPECTED_CHALLENGE_MESSAGE: &str = "unexpected challenge required";
pub const DENIED_MESSAGE: &str = "remote side denied access";

/// Reply details returned from `authenticate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthReply {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl AuthReply {
    fn message(message: &str) -> Self {
        AuthReply {
            message: message.to_string(),
            serial: None,
            token_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub accepted: bool,
    pub verdict: Verdict,
    pub reply: AuthReply,
}

pub struct RadiusTokenAdapter {
    token: Token,
    orchestrator: Arc<ChallengeOrchestrator>,
    pins: Arc<dyn PinPolicy>,
}

impl RadiusTokenAdapter {
    pub fn new(token: Token, orchestrator: Arc<ChallengeOrchestrator>, pins: Arc<dyn PinPolicy>) -> Self {
        RadiusTokenAdapter {
            token,
            orchestrator,
            pins,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    fn bridge(&self) -> &RadiusBridge {
        self.orchestrator.bridge()
    }

    fn ensure_unlocked(&self) -> Result<(), TokenError> {
        if self.token.locked {
            debug!(serial = %self.token.serial, "Token is locked");
            return Err(TokenError::Locked(self.token.serial.clone()));
        }
        Ok(())
    }

    pub fn check_pin_local(&self) -> bool {
        self.token.check_pin_local()
    }

    /// Split `passw` into `(pin, otp)`
    ///
    /// Only a locally checked PIN is split off. Otherwise the whole input goes
    /// to the server and the PIN is empty.
    pub fn split_pin_pass(&self, passw: &str) -> (String, String) {
        if self.check_pin_local() {
            self.pins.split_pin_pass(&self.token, passw)
        } else {
            (String::new(), passw.to_string())
        }
    }

    /// Verify a local PIN if the token wants one, returning the OTP part
    fn local_pin(&self, passw: &str) -> Option<String> {
        let (pin, otp) = self.split_pin_pass(passw);
        if self.check_pin_local() && !self.pins.check_pin(&self.token, &pin) {
            info!(serial = %self.token.serial, "Local PIN check failed");
            return None;
        }
        Some(otp)
    }

    /// The cached verdict of this attempt, or a fresh check
    fn verdict(&self, otp: &str, ctx: &mut AttemptContext) -> Verdict {
        let saved = ctx.server_state.clone();
        self.bridge().check_radius(&self.token, otp, ctx, saved.as_ref())
    }

    /// Whether `passw` makes the server send a challenge
    pub fn is_challenge_request(&self, passw: &str, ctx: &mut AttemptContext) -> bool {
        if self.ensure_unlocked().is_err() {
            return false;
        }
        match self.local_pin(passw) {
            Some(otp) => self.verdict(&otp, ctx) == Verdict::Challenge,
            None => false,
        }
    }

    pub fn create_challenge(
        &self,
        transaction_id: Option<&str>,
        ctx: &AttemptContext,
    ) -> Result<CreatedChallenge, TokenError> {
        self.ensure_unlocked()?;
        Ok(self.orchestrator.create_challenge(&self.token, transaction_id, ctx)?)
    }

    /// Whether `passw` answers a pending challenge; see
    /// [`ChallengeOrchestrator::is_challenge_response`]
    pub fn is_challenge_response(&self, passw: &str, ctx: &mut AttemptContext) -> bool {
        if self.ensure_unlocked().is_err() {
            return false;
        }
        self.orchestrator.is_challenge_response(&self.token, passw, ctx)
    }

    pub fn check_challenge_response(&self, passw: &str, ctx: &mut AttemptContext) -> Result<Verdict, TokenError> {
        self.ensure_unlocked()?;
        Ok(self.orchestrator.check_challenge_response(&self.token, passw, ctx))
    }

    /// Authenticate `passw`, PIN included when checked locally
    pub fn authenticate(&self, passw: &str, ctx: &mut AttemptContext) -> Result<AuthOutcome, TokenError> {
        self.ensure_unlocked()?;

        let Some(otp) = self.local_pin(passw) else {
            return Ok(AuthOutcome {
                accepted: false,
                verdict: Verdict::Reject,
                reply: AuthReply::message(WRONG_PIN_MESSAGE),
            });
        };

        let verdict = self.verdict(&otp, ctx);
        let outcome = match verdict {
            Verdict::Accept => AuthOutcome {
                accepted: true,
                verdict,
                reply: AuthReply {
                    message: MATCHED_MESSAGE.to_string(),
                    serial: Some(self.token.serial.clone()),
                    token_type: Some(self.token.token_type().to_string()),
                },
            },
            Verdict::Challenge => AuthOutcome {
                accepted: false,
                verdict,
                reply: AuthReply::message(UNEXPECTED_CHALLENGE_MESSAGE),
            },
            Verdict::Reject => AuthOutcome {
                accepted: false,
                verdict,
                reply: AuthReply::message(DENIED_MESSAGE),
            },
        };
        Ok(outcome)
    }

    /// Plain OTP check; a challenge counts as a match
    pub fn check_otp(&self, otp: &str, ctx: &mut AttemptContext) -> Result<bool, TokenError> {
        self.ensure_unlocked()?;
        Ok(self.bridge().check_radius(&self.token, otp, ctx, None) != Verdict::Reject)
    }
}
