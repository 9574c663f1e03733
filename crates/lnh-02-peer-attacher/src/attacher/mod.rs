//! # Peer Attacher
//!
//! Opens an authenticated peer connection into a running node, bypassing
//! its bootstrap and discovery path.
//!
//! ## Attach Sequence
//!
//! 1. Generate an [`EphemeralIdentity`].
//! 2. Obtain a raw connection from the [`AttachTarget`].
//! 3. Build a [`MessageCodec`] on a private metrics registry.
//! 4. Build [`PeerMetrics`] on the same registry, logging to a no-op sink.
//! 5. Assemble and validate the [`PeerConfig`].
//! 6. Upgrade the connection to TLS, deriving the remote [`NodeId`].
//! 7. Start the [`PeerSession`].
//!
//! Exactly one attempt is made. Any failure aborts the attachment and
//! drops whatever connection was opened. Steps 2 and 6 are bounded by the
//! handshake timeout; running out of time in step 6 is a handshake failure
//! like any other.
//!
//! [`NodeId`]: shared_types::NodeId

use std::io;
use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use thiserror::Error;
use tracing::{debug, info};

use crate::codec::{CodecError, MessageCodec, DEFAULT_MAX_MESSAGE_SIZE};
use crate::config::{
    ConfigError, PeerConfig, DEFAULT_MAX_CLOCK_DIFFERENCE, DEFAULT_PING_FREQUENCY,
    DEFAULT_PONG_TIMEOUT,
};
use crate::domain::{
    DefaultVersionParser, EphemeralIdentity, IdentityError, ValidatorSet, VersionCompatibility,
};
use crate::metrics::{PeerMetrics, SessionLog};
use crate::network::TestNetwork;
use crate::ports::{AttachTarget, InboundHandler};
use crate::session::{PeerSession, StartError};
use crate::throttling::{NoInboundThrottler, NoOutboundThrottler};
use crate::upgrade::{TlsClientUpgrader, UpgradeError};

/// Bound on connecting and on the TLS upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("ephemeral identity: {0}")]
    Crypto(#[from] IdentityError),

    #[error("connecting to peer port failed: {0}")]
    Connection(#[source] io::Error),

    #[error("connecting to peer port timed out after {0:?}")]
    Timeout(Duration),

    #[error("message codec: {0}")]
    Codec(#[from] CodecError),

    #[error("peer metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("peer configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("security upgrade failed: {0}")]
    Handshake(#[from] UpgradeError),

    #[error("starting peer session: {0}")]
    Start(#[from] StartError),
}

/// Metric namespace inside each attachment's private registry.
const METRICS_NAMESPACE: &str = "";

/// Attaches instrumentation peers to nodes.
#[derive(Debug, Clone)]
pub struct PeerAttacher {
    handshake_timeout: Duration,
}

impl Default for PeerAttacher {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl PeerAttacher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Attach a new peer to `target`, routing its inbound application
    /// messages to `handler`.
    pub async fn attach(
        &self,
        target: &dyn AttachTarget,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<PeerSession, AttachError> {
        let network_id = target.network_id();

        let identity = EphemeralIdentity::generate()?;
        let signer = identity.signer()?;
        debug!(local_id = %identity.node_id(), "generated ephemeral identity");

        let conn = tokio::time::timeout(self.handshake_timeout, target.get_connection())
            .await
            .map_err(|_| AttachError::Timeout(self.handshake_timeout))?
            .map_err(AttachError::Connection)?;
        debug!("peer connection opened");

        let registry = Registry::new();
        let codec = MessageCodec::new(&registry, METRICS_NAMESPACE, DEFAULT_MAX_MESSAGE_SIZE)?;
        let log = SessionLog::noop();
        let metrics = PeerMetrics::new(&log, METRICS_NAMESPACE, &registry)?;

        let config = PeerConfig::builder()
            .codec(Arc::new(codec))
            .metrics(metrics)
            .log(log)
            .inbound_throttler(Arc::new(NoInboundThrottler))
            .outbound_throttler(Arc::new(NoOutboundThrottler))
            .network(Arc::new(TestNetwork::new(network_id, signer)))
            .router(handler)
            .version_compatibility(VersionCompatibility::for_network(network_id))
            .version_parser(Arc::new(DefaultVersionParser))
            .my_subnets(Vec::new())
            .beacons(ValidatorSet::new())
            .network_id(network_id)
            .ping_frequency(DEFAULT_PING_FREQUENCY)
            .pong_timeout(DEFAULT_PONG_TIMEOUT)
            .max_clock_difference(DEFAULT_MAX_CLOCK_DIFFERENCE)
            .build()?;

        let upgrader = TlsClientUpgrader::new(&identity)?;
        let upgraded = tokio::time::timeout(self.handshake_timeout, upgrader.upgrade(conn))
            .await
            .map_err(|_| UpgradeError::Timeout(self.handshake_timeout))??;
        debug!(peer_id = %upgraded.peer_id, "security upgrade complete");

        let session =
            PeerSession::start(config, upgraded.stream, upgraded.cert, upgraded.peer_id)?;
        info!(
            peer_id = %session.id(),
            local_id = %identity.node_id(),
            network_id,
            "attached peer"
        );
        Ok(session)
    }
}
