//! Configuration: system settings, named RADIUS servers and enrolled tokens
//!
//! The bridge never reads global state. System-wide settings reach it through
//! a [`ConfigProvider`] and named servers through a [`RadiusServerRegistry`],
//! both injected at construction. [`Config`] is the JSON file the binary loads
//! and implements both.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

/// System configuration keys read by this token type
pub mod keys {
    pub const RADIUS_SERVER: &str = "radius.server";
    pub const RADIUS_SECRET: &str = "radius.secret";
    pub const NAS_IDENTIFIER: &str = "radius.nas_identifier";
    pub const DICTIONARY: &str = "radius.dictfile";
    pub const CHALLENGE_VALIDITY: &str = "DefaultChallengeValidityTime";
}

pub const DEFAULT_NAS_IDENTIFIER: &str = "privacyIDEA";
pub const DEFAULT_DICTIONARY: &str = "/etc/privacyidea/dictionary";
pub const DEFAULT_CHALLENGE_VALIDITY: u64 = 120;
pub const DEFAULT_AUTH_PORT: u16 = 1812;

/// Read-only string lookup into system-wide configuration
pub trait ConfigProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Challenge validity in seconds; unparsable values fall back to the default
    fn challenge_validity(&self) -> u64 {
        self.get(keys::CHALLENGE_VALIDITY)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_CHALLENGE_VALIDITY)
    }
}

impl ConfigProvider for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigProvider for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

/// How a token finds its RADIUS server, decided once per check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Look up a named server in the registry
    NamedServer(String),
    /// Use `radius.server` / `radius.secret` from system configuration
    SystemWide,
    /// Use the token's own `radius.server` and stored secret
    PerToken,
}

/// Connection parameters for one RADIUS server
#[derive(Clone, PartialEq, Eq)]
pub struct RadiusServerConfig {
    pub host: String,
    pub port: u16,
    pub secret: Vec<u8>,
    /// Attribute dictionary path; `None` means the system default
    pub dictionary: Option<String>,
}

impl RadiusServerConfig {
    /// Build from a `host[:port]` string, defaulting to port 1812
    pub fn from_server_string(server: &str, secret: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let server = server.trim();
        let (host, port) = match server.rsplit_once(':') {
            // Bare IPv6 literal without brackets has more than one colon
            Some((host, port)) if !host.contains(':') || host.starts_with('[') => {
                let port = port.parse::<u16>().map_err(|_| {
                    ConfigError::Invalid(format!("Invalid port in RADIUS server '{}'", server))
                })?;
                (host.trim_matches(|c| c == '[' || c == ']'), port)
            }
            _ => (server, DEFAULT_AUTH_PORT),
        };

        if host.is_empty() {
            return Err(ConfigError::Invalid("RADIUS server host cannot be empty".to_string()));
        }

        Ok(RadiusServerConfig {
            host: host.to_string(),
            port,
            secret: secret.into(),
            dictionary: None,
        })
    }

    /// `host:port` for logging
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Debug for RadiusServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadiusServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .field("dictionary", &self.dictionary)
            .finish()
    }
}

/// A named server entry in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiusServerDefinition {
    /// Name tokens refer to through `radius.identifier`
    pub identifier: String,

    /// Host name or IP address
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret
    pub secret: String,

    #[serde(default)]
    pub dictionary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_AUTH_PORT
}

impl RadiusServerDefinition {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier.is_empty() {
            return Err(ConfigError::Invalid("RADIUS server identifier cannot be empty".to_string()));
        }
        if self.server.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "RADIUS server '{}' has no host",
                self.identifier
            )));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid(format!(
                "RADIUS server '{}' has port 0",
                self.identifier
            )));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "RADIUS server '{}' has empty secret",
                self.identifier
            )));
        }
        Ok(())
    }

    pub fn to_server_config(&self) -> RadiusServerConfig {
        RadiusServerConfig {
            host: self.server.clone(),
            port: self.port,
            secret: self.secret.clone().into_bytes(),
            dictionary: self.dictionary.clone(),
        }
    }
}

/// Lookup of named RADIUS server configurations
pub trait RadiusServerRegistry: Send + Sync {
    fn resolve(&self, identifier: &str) -> Option<RadiusServerConfig>;
}

/// In-memory registry built from server definitions
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: HashMap<String, RadiusServerDefinition>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = RadiusServerDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.insert(definition);
        }
        registry
    }

    pub fn insert(&mut self, definition: RadiusServerDefinition) {
        self.servers.insert(definition.identifier.clone(), definition);
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl RadiusServerRegistry for ServerRegistry {
    fn resolve(&self, identifier: &str) -> Option<RadiusServerConfig> {
        self.servers.get(identifier).map(RadiusServerDefinition::to_server_config)
    }
}

/// An enrolled token in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDefinition {
    pub serial: String,

    /// Enrollment parameters, as passed to `Token::update`
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    #[serde(default)]
    pub locked: bool,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,

    /// System-wide settings (`radius.server`, `radius.nas_identifier`, ...)
    #[serde(default)]
    pub system: BTreeMap<String, String>,

    /// Named RADIUS servers
    #[serde(default)]
    pub servers: Vec<RadiusServerDefinition>,

    /// Enrolled tokens
    #[serde(default)]
    pub tokens: Vec<TokenDefinition>,
}

impl Config {
    /// Load and validate configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut identifiers = HashSet::new();
        for server in &self.servers {
            server.validate()?;
            if !identifiers.insert(server.identifier.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate RADIUS server identifier '{}'",
                    server.identifier
                )));
            }
        }

        let mut serials = HashSet::new();
        for token in &self.tokens {
            if token.serial.is_empty() {
                return Err(ConfigError::Invalid("Token has empty serial".to_string()));
            }
            if !serials.insert(token.serial.as_str()) {
                return Err(ConfigError::Invalid(format!("Duplicate token serial '{}'", token.serial)));
            }
            if let Some(identifier) = token.params.get("radius.identifier")
                && !identifier.is_empty()
                && !identifiers.contains(identifier.as_str())
            {
                return Err(ConfigError::UnknownServer(identifier.clone()));
            }
        }

        if let Some(validity) = self.system.get(keys::CHALLENGE_VALIDITY)
            && validity.trim().parse::<u64>().is_err()
        {
            return Err(ConfigError::Invalid(format!(
                "{} must be a number of seconds, got '{}'",
                keys::CHALLENGE_VALIDITY,
                validity
            )));
        }

        Ok(())
    }

    pub fn registry(&self) -> ServerRegistry {
        ServerRegistry::from_definitions(self.servers.iter().cloned())
    }

    pub fn find_token(&self, serial: &str) -> Option<&TokenDefinition> {
        self.tokens.iter().find(|t| t.serial == serial)
    }

    /// Example configuration written when none exists
    pub fn example() -> Self {
        let mut system = BTreeMap::new();
        system.insert(keys::NAS_IDENTIFIER.to_string(), DEFAULT_NAS_IDENTIFIER.to_string());
        system.insert(keys::CHALLENGE_VALIDITY.to_string(), DEFAULT_CHALLENGE_VALIDITY.to_string());
        system.insert(keys::RADIUS_SERVER.to_string(), "10.0.0.20:1812".to_string());
        system.insert(keys::RADIUS_SECRET.to_string(), "system_secret".to_string());

        let mut named = BTreeMap::new();
        named.insert("radius.identifier".to_string(), "corp-radius".to_string());
        named.insert("radius.user".to_string(), "alice".to_string());

        let mut local_pin = BTreeMap::new();
        local_pin.insert("radius.system_settings".to_string(), "true".to_string());
        local_pin.insert("radius.user".to_string(), "bob".to_string());
        local_pin.insert("radius.local_checkpin".to_string(), "1".to_string());
        local_pin.insert("pin".to_string(), "1234".to_string());

        Config {
            log_level: Some("info".to_string()),
            system,
            servers: vec![RadiusServerDefinition {
                identifier: "corp-radius".to_string(),
                server: "10.0.0.10".to_string(),
                port: DEFAULT_AUTH_PORT,
                secret: "testing123".to_string(),
                dictionary: None,
                description: Some("Corporate RADIUS".to_string()),
            }],
            tokens: vec![
                TokenDefinition {
                    serial: "PIRA0001".to_string(),
                    params: named,
                    locked: false,
                },
                TokenDefinition {
                    serial: "PIRA0002".to_string(),
                    params: local_pin,
                    locked: false,
                },
            ],
        }
    }
}

impl ConfigProvider for Config {
    fn get(&self, key: &str) -> Option<String> {
        self.system.get(key).cloned()
    }
}
