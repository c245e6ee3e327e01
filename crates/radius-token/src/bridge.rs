//! RADIUS session bridge
//!
//! Turns one OTP check into at most one Access-Request and maps the reply to a
//! [`Verdict`]. The outcome is always written back into the caller's
//! [`AttemptContext`] so later steps of the same attempt can reuse it.

use crate::config::{
    ConfigProvider, DEFAULT_DICTIONARY, DEFAULT_NAS_IDENTIFIER, RadiusServerConfig, RadiusServerRegistry,
    ResolutionMode, keys,
};
use crate::context::{AttemptContext, ServerState};
use crate::error::ConfigError;
use crate::token::{Token, info};
use crate::transport::{AccessRequest, RadiusTransport};
use crate::verdict::Verdict;
use radius_proto::Code;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const ACCEPT_MESSAGE: &str = "RADIUS authentication succeeded";
const REJECT_MESSAGE: &str = "RADIUS authentication failed";

pub struct RadiusBridge {
    config: Arc<dyn ConfigProvider>,
    registry: Arc<dyn RadiusServerRegistry>,
    transport: Arc<dyn RadiusTransport>,
}

impl RadiusBridge {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        registry: Arc<dyn RadiusServerRegistry>,
        transport: Arc<dyn RadiusTransport>,
    ) -> Self {
        RadiusBridge {
            config,
            registry,
            transport,
        }
    }

    pub fn config(&self) -> &Arc<dyn ConfigProvider> {
        &self.config
    }

    /// Connection parameters for `token`, following its resolution mode
    pub fn resolve_server(&self, token: &Token) -> Result<RadiusServerConfig, ConfigError> {
        let mut server = match token.resolution_mode() {
            ResolutionMode::NamedServer(identifier) => self
                .registry
                .resolve(&identifier)
                .ok_or(ConfigError::UnknownServer(identifier))?,
            ResolutionMode::SystemWide => {
                let address = self.config.get(keys::RADIUS_SERVER).ok_or_else(|| {
                    ConfigError::Invalid(format!("system setting {} is not set", keys::RADIUS_SERVER))
                })?;
                let secret = self.config.get(keys::RADIUS_SECRET).ok_or_else(|| {
                    ConfigError::Invalid(format!("system setting {} is not set", keys::RADIUS_SECRET))
                })?;
                RadiusServerConfig::from_server_string(&address, secret.into_bytes())?
            }
            ResolutionMode::PerToken => {
                let address = token.get_info(info::SERVER).ok_or_else(|| {
                    ConfigError::Invalid(format!("token {} has no {}", token.serial, info::SERVER))
                })?;
                let secret = token.secret().ok_or_else(|| {
                    ConfigError::Invalid(format!("token {} has no RADIUS secret", token.serial))
                })?;
                RadiusServerConfig::from_server_string(address, secret)?
            }
        };

        if server.dictionary.is_none() {
            server.dictionary = Some(self.config.get_or(keys::DICTIONARY, DEFAULT_DICTIONARY));
        }
        Ok(server)
    }

    pub fn nas_identifier(&self) -> String {
        self.config.get_or(keys::NAS_IDENTIFIER, DEFAULT_NAS_IDENTIFIER)
    }

    /// Run one RADIUS check for `otp`
    ///
    /// `saved_state` is the continuation remembered from an earlier challenge.
    /// A sentinel in the context, or passed as `saved_state`, answers without
    /// touching the network. Once this attempt holds a verdict it is final.
    /// Every failure is a rejection and is cached as such.
    pub fn check_radius(
        &self,
        token: &Token,
        otp: &str,
        ctx: &mut AttemptContext,
        saved_state: Option<&ServerState>,
    ) -> Verdict {
        if let Some(verdict) = ctx.cached_verdict() {
            debug!(serial = %token.serial, verdict = %verdict, "Verdict already cached in this attempt");
            return verdict;
        }

        if token.locked {
            warn!(serial = %token.serial, "Token is locked, not contacting RADIUS server");
            ctx.record(Verdict::Reject, Some(ServerState::Rejected), None);
            return Verdict::Reject;
        }

        let known = [ctx.server_state.as_ref(), saved_state]
            .into_iter()
            .flatten()
            .find(|state| state.is_sentinel())
            .cloned();

        match known {
            Some(ServerState::Success) => {
                debug!(serial = %token.serial, "Earlier check in this attempt succeeded");
                ctx.record(Verdict::Accept, None, None);
                return Verdict::Accept;
            }
            Some(_) => {
                debug!(serial = %token.serial, "Earlier check in this attempt was rejected");
                ctx.record(Verdict::Reject, None, None);
                return Verdict::Reject;
            }
            None => {}
        }

        let (verdict, state, message) = match self.exchange(token, otp, ctx, saved_state) {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!(serial = %token.serial, reason = %reason, "RADIUS check failed, rejecting");
                (Verdict::Reject, Some(ServerState::Rejected), None)
            }
        };

        ctx.record(verdict, state, message);
        verdict
    }

    fn exchange(
        &self,
        token: &Token,
        otp: &str,
        ctx: &AttemptContext,
        saved_state: Option<&ServerState>,
    ) -> Result<(Verdict, Option<ServerState>, Option<String>), String> {
        let server = self.resolve_server(token).map_err(|e| e.to_string())?;
        let user_name = token
            .get_info(info::USER)
            .ok_or_else(|| format!("token {} has no {}", token.serial, info::USER))?
            .to_string();

        // A saved continuation takes precedence over the client's transaction id
        let state = saved_state
            .and_then(ServerState::as_radius)
            .map(<[u8]>::to_vec)
            .or_else(|| ctx.transaction_id.as_ref().map(|tx| tx.clone().into_bytes()));

        let request = AccessRequest {
            user_name,
            nas_identifier: self.nas_identifier(),
            password: otp.to_string(),
            state,
        };

        debug!(
            serial = %token.serial,
            server = %server.address(),
            user = %request.user_name,
            otp_len = otp.len(),
            nas_identifier = %request.nas_identifier,
            dictionary = ?server.dictionary,
            "Checking OTP on RADIUS server"
        );
        if request.state.is_some() {
            info!(serial = %token.serial, "Sending saved challenge state to RADIUS server");
        }

        let reply = self.transport.send(&server, &request).map_err(|e| {
            error!(server = %server.address(), error = %e, "Error contacting RADIUS server");
            e.to_string()
        })?;

        let verdict = Verdict::from(reply.code);
        let outcome = match verdict {
            Verdict::Challenge => {
                info!(
                    server = %server.address(),
                    user = %request.user_name,
                    message = ?reply.reply_message,
                    "RADIUS server returned a challenge"
                );
                // Without a new State the saved continuation stays current
                let state = reply.state.map(ServerState::Radius).or_else(|| saved_state.cloned());
                (verdict, state, reply.reply_message)
            }
            Verdict::Accept => {
                info!(server = %server.address(), user = %request.user_name, "RADIUS server granted access");
                (verdict, Some(ServerState::Success), Some(ACCEPT_MESSAGE.to_string()))
            }
            Verdict::Reject => {
                if reply.code != Code::AccessReject {
                    debug!(code = %reply.code, "Unexpected RADIUS reply code");
                }
                info!(server = %server.address(), user = %request.user_name, "RADIUS server rejected access");
                (verdict, Some(ServerState::Rejected), Some(REJECT_MESSAGE.to_string()))
            }
        };
        Ok(outcome)
    }
}
