//! RADIUS pass-through token
//!
//! A token type whose OTP checks are answered by a remote RADIUS server. It
//! maps the Access-Accept / Access-Reject / Access-Challenge exchange onto the
//! challenge-response lifecycle of an authentication framework, and caches
//! the outcome per attempt so one attempt costs at most one round trip.
//!
//! # Example
//!
//! ```rust,no_run
//! use radius_token::{
//!     AttemptContext, ChallengeOrchestrator, Config, MemoryChallengeStore, PrefixPinPolicy,
//!     RadiusBridge, RadiusTokenAdapter, Token, UdpTransport,
//! };
//! use std::sync::Arc;
//!
//! let config = Config::example();
//! let registry = config.registry();
//! let definition = config.find_token("PIRA0001").unwrap();
//! let token = Token::enroll(&definition.serial, &definition.params).unwrap();
//!
//! let bridge = RadiusBridge::new(Arc::new(config), Arc::new(registry), Arc::new(UdpTransport::new()));
//! let orchestrator = ChallengeOrchestrator::new(Arc::new(MemoryChallengeStore::new()), Arc::new(bridge));
//! let adapter = RadiusTokenAdapter::new(token, Arc::new(orchestrator), Arc::new(PrefixPinPolicy));
//!
//! let mut ctx = AttemptContext::new();
//! let outcome = adapter.authenticate("123456", &mut ctx).unwrap();
//! println!("{}: {}", outcome.verdict, outcome.reply.message);
//! ```

pub mod adapter;
pub mod bridge;
pub mod challenge;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod token;
pub mod transport;
pub mod verdict;

pub use adapter::{AuthOutcome, AuthReply, RadiusTokenAdapter};
pub use bridge::RadiusBridge;
pub use challenge::{Challenge, ChallengeStore, MemoryChallengeStore};
pub use config::{
    Config, ConfigProvider, RadiusServerConfig, RadiusServerDefinition, RadiusServerRegistry, ResolutionMode,
    ServerRegistry, TokenDefinition,
};
pub use context::{AttemptContext, ServerState};
pub use error::{ConfigError, StoreError, TokenError, TransportError};
pub use orchestrator::{ChallengeOrchestrator, CreatedChallenge};
pub use token::{ClassInfo, PinPolicy, PrefixPinPolicy, Token, class_info};
pub use transport::{AccessReply, AccessRequest, RadiusTransport, UdpTransport};
pub use verdict::Verdict;
