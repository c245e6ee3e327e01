//! The RADIUS token record, its enrollment and class metadata

use crate::config::ResolutionMode;
use crate::context::{decode_hex, encode_hex};
use crate::error::ConfigError;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Token info keys owned by this token type
pub mod info {
    pub const IDENTIFIER: &str = "radius.identifier";
    pub const USER: &str = "radius.user";
    pub const SERVER: &str = "radius.server";
    pub const SECRET: &str = "radius.secret";
    pub const LOCAL_CHECKPIN: &str = "radius.local_checkpin";
    pub const SYSTEM_SETTINGS: &str = "radius.system_settings";
    pub const TOKENKIND: &str = "tokenkind";
}

pub const TOKEN_TYPE: &str = "radius";
pub const CLASS_PREFIX: &str = "PIRA";
pub const TOKENKIND_VIRTUAL: &str = "virtual";
pub const DEFAULT_OTP_LEN: usize = 6;

/// Loose boolean parsing for flags stored as strings
pub fn is_true(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "t" | "y"
    )
}

/// Description of this token type for the enrollment UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassInfo {
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Roles that may enroll it themselves
    pub user: Vec<&'static str>,
    pub ui_enroll: Vec<&'static str>,
    /// Authentication modes the type supports
    pub mode: Vec<&'static str>,
}

pub fn class_info() -> ClassInfo {
    ClassInfo {
        token_type: TOKEN_TYPE,
        title: "RADIUS Token",
        description: "RADIUS: Forward authentication request to a RADIUS server.",
        user: vec!["enroll"],
        ui_enroll: vec!["admin", "user"],
        mode: vec!["authenticate", "challenge"],
    }
}

/// An enrolled RADIUS token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub serial: String,
    /// Hex-encoded shared secret, only used in per-token mode
    otp_key: Option<String>,
    info: BTreeMap<String, String>,
    pub otp_len: usize,
    /// Local PIN, checked by the host's PIN policy
    pub pin: Option<String>,
    pub description: Option<String>,
    pub locked: bool,
}

impl Token {
    pub fn new(serial: impl Into<String>) -> Self {
        Token {
            serial: serial.into(),
            otp_key: None,
            info: BTreeMap::new(),
            otp_len: DEFAULT_OTP_LEN,
            pin: None,
            description: None,
            locked: false,
        }
    }

    /// Enroll a token from request parameters
    pub fn enroll(serial: impl Into<String>, params: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut token = Token::new(serial);
        token.update(params)?;
        Ok(token)
    }

    pub fn token_type(&self) -> &'static str {
        TOKEN_TYPE
    }

    pub fn get_info(&self, key: &str) -> Option<&str> {
        self.info.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn set_info(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.info.insert(key.into(), value.into());
    }

    pub fn info(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    pub fn set_secret(&mut self, secret: &[u8]) {
        self.otp_key = Some(encode_hex(secret));
    }

    /// The stored secret, decoded from hex
    pub fn secret(&self) -> Option<Vec<u8>> {
        self.otp_key.as_deref().and_then(decode_hex)
    }

    /// Whether the PIN is verified here rather than by the RADIUS server
    pub fn check_pin_local(&self) -> bool {
        let local = self.get_info(info::LOCAL_CHECKPIN).is_some_and(is_true);
        debug!(serial = %self.serial, local = local, "local checking pin?");
        local
    }

    /// Which configuration source this token uses; named > system-wide > per-token
    pub fn resolution_mode(&self) -> ResolutionMode {
        if let Some(identifier) = self.get_info(info::IDENTIFIER) {
            ResolutionMode::NamedServer(identifier.to_string())
        } else if self.get_info(info::SYSTEM_SETTINGS).is_some_and(is_true) {
            ResolutionMode::SystemWide
        } else {
            ResolutionMode::PerToken
        }
    }

    /// Apply enrollment parameters
    ///
    /// Either `radius.identifier` or the legacy `radius.server` /
    /// `radius.secret` / `radius.system_settings` must be present, and
    /// `radius.user` always is.
    pub fn update(&mut self, params: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        let param = |key: &str| non_empty(params, key);

        if let Some(identifier) = param(info::IDENTIFIER) {
            self.set_info(info::IDENTIFIER, identifier);
        } else {
            let server = param(info::SERVER);
            let secret = param(info::SECRET);
            let system_settings = param(info::SYSTEM_SETTINGS).unwrap_or("false");

            if let Some(server) = server {
                self.set_info(info::SERVER, server);
            }
            if let Some(secret) = secret {
                self.set_secret(secret.as_bytes());
            }
            self.set_info(info::SYSTEM_SETTINGS, system_settings);

            if server.is_none() && secret.is_none() && !is_true(system_settings) {
                return Err(ConfigError::MissingParameter(info::IDENTIFIER.to_string()));
            }
        }

        // Generic fields may still override the OTP length
        self.otp_len = DEFAULT_OTP_LEN;
        self.update_base(params)?;

        self.set_info(info::LOCAL_CHECKPIN, param(info::LOCAL_CHECKPIN).unwrap_or("0"));

        let user = param(info::USER)
            .ok_or_else(|| ConfigError::MissingParameter(info::USER.to_string()))?;
        self.set_info(info::USER, user);
        self.set_info(info::TOKENKIND, TOKENKIND_VIRTUAL);

        Ok(())
    }

    /// Fields every token type accepts at enrollment
    fn update_base(&mut self, params: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        if let Some(description) = params.get("description") {
            self.description = Some(description.clone());
        }
        if let Some(pin) = params.get("pin") {
            self.pin = Some(pin.clone());
        }
        if let Some(otplen) = params.get("otplen") {
            self.otp_len = otplen
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("otplen must be a number, got '{}'", otplen)))?;
        }
        Ok(())
    }
}

fn non_empty<'a>(params: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Local PIN handling supplied by the hosting framework
pub trait PinPolicy: Send + Sync {
    /// Split `passw` into `(pin, otp)`
    fn split_pin_pass(&self, token: &Token, passw: &str) -> (String, String);

    fn check_pin(&self, token: &Token, pin: &str) -> bool;
}

/// PIN prefix followed by an OTP of the token's length
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixPinPolicy;

impl PinPolicy for PrefixPinPolicy {
    fn split_pin_pass(&self, token: &Token, passw: &str) -> (String, String) {
        let chars: Vec<char> = passw.chars().collect();
        let split = chars.len().saturating_sub(token.otp_len);
        (
            chars[..split].iter().collect(),
            chars[split..].iter().collect(),
        )
    }

    fn check_pin(&self, token: &Token, pin: &str) -> bool {
        // A token without a PIN accepts the empty PIN only
        let expected = token.pin.as_deref().unwrap_or("");
        expected.len() == pin.len()
            && expected
                .bytes()
                .zip(pin.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}
