//! # Peer Attacher
//!
//! Attaches an authenticated instrumentation peer to a running node so
//! tests can observe or inject protocol traffic without going through the
//! node's bootstrap and discovery path.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   raw stream   ┌─────────────┐   tls stream   ┌─────────────┐
//! │ AttachTarget │ ─────────────► │ TlsClient   │ ─────────────► │ PeerSession │
//! │ (node handle)│                │ Upgrader    │                │ (3 tasks)   │
//! └──────────────┘                └─────────────┘                └──────┬──────┘
//!                                                                       │
//!                                                          InboundHandler (router)
//! ```
//!
//! ## Module Layout
//!
//! - `domain`: identities, versions, messages, validator sets
//! - `codec`: length-prefixed bincode frames with per-registry metrics
//! - `config`: validated [`PeerConfig`] and its builder
//! - `upgrade`: TLS 1.3 client and server upgraders
//! - `session`: the running connection
//! - `attacher`: the attach sequence

pub mod attacher;
pub mod codec;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod network;
pub mod ports;
pub mod session;
pub mod throttling;
pub mod upgrade;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use attacher::{AttachError, PeerAttacher, DEFAULT_HANDSHAKE_TIMEOUT};
pub use codec::{CodecError, MessageCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use config::{
    ConfigError, PeerConfig, PeerConfigBuilder, DEFAULT_MAX_CLOCK_DIFFERENCE,
    DEFAULT_PING_FREQUENCY, DEFAULT_PONG_TIMEOUT,
};
pub use domain::{
    ApplicationVersion, EphemeralIdentity, IdentityError, InboundMessage, Message, Op,
    VersionCompatibility, CHAIN_ID_LEN,
};
pub use metrics::{PeerMetrics, SessionLog};
pub use network::{PeerNetwork, TestNetwork};
pub use ports::{AttachTarget, BoxedStream, ChannelHandler, InboundHandler, PeerStream};
pub use session::{CloseReason, PeerSession, RejectReason, StartError};
pub use throttling::{NoInboundThrottler, NoOutboundThrottler};
pub use upgrade::{TlsClientUpgrader, TlsServerUpgrader, UpgradeError, Upgraded};
