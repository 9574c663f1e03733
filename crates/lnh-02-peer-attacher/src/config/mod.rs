//! # Peer Configuration
//!
//! Everything a [`PeerSession`](crate::session::PeerSession) needs, gathered
//! into one validated value. Build it with [`PeerConfig::builder`]:
//!
//! ```ignore
//! let config = PeerConfig::builder()
//!     .codec(codec)
//!     .metrics(metrics)
//!     .network(Arc::new(network))
//!     .router(Arc::new(handler))
//!     .network_id(LOCAL_ID)
//!     .build()?;
//! ```
//!
//! Fields without a sensible default (`codec`, `metrics`, `network`,
//! `router`) are required. Everything else falls back to the named defaults
//! below.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use shared_types::SubnetId;
use thiserror::Error;

use crate::codec::MessageCodec;
use crate::domain::{DefaultVersionParser, ValidatorSet, VersionCompatibility, VersionParser};
use crate::metrics::{PeerMetrics, SessionLog};
use crate::network::PeerNetwork;
use crate::ports::InboundHandler;
use crate::throttling::{
    InboundMsgThrottler, NoInboundThrottler, NoOutboundThrottler, OutboundMsgThrottler,
};

/// Interval between pings sent to a connected peer.
pub const DEFAULT_PING_FREQUENCY: Duration = Duration::from_millis(22_500);

/// Silence after which a peer is considered gone.
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted difference between our clock and a peer's.
pub const DEFAULT_MAX_CLOCK_DIFFERENCE: Duration = Duration::from_secs(60);

/// Capacity of a session's outbound queue.
pub const DEFAULT_SEND_QUEUE_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Validated session configuration.
#[derive(Clone)]
pub struct PeerConfig {
    pub codec: Arc<MessageCodec>,
    pub metrics: PeerMetrics,
    pub log: SessionLog,
    pub inbound_throttler: Arc<dyn InboundMsgThrottler>,
    pub outbound_throttler: Arc<dyn OutboundMsgThrottler>,
    pub network: Arc<dyn PeerNetwork>,
    pub router: Arc<dyn InboundHandler>,
    pub version_compatibility: VersionCompatibility,
    pub version_parser: Arc<dyn VersionParser>,
    pub my_subnets: HashSet<SubnetId>,
    pub beacons: ValidatorSet,
    pub network_id: u32,
    pub ping_frequency: Duration,
    pub pong_timeout: Duration,
    pub max_clock_difference: Duration,
    pub send_queue_size: usize,
}

impl PeerConfig {
    pub fn builder() -> PeerConfigBuilder {
        PeerConfigBuilder::default()
    }
}

impl fmt::Debug for PeerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConfig")
            .field("network_id", &self.network_id)
            .field("version", self.version_compatibility.current())
            .field("ping_frequency", &self.ping_frequency)
            .field("pong_timeout", &self.pong_timeout)
            .field("max_clock_difference", &self.max_clock_difference)
            .field("my_subnets", &self.my_subnets.len())
            .field("beacons", &self.beacons.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PeerConfig`].
#[derive(Default)]
pub struct PeerConfigBuilder {
    codec: Option<Arc<MessageCodec>>,
    metrics: Option<PeerMetrics>,
    log: Option<SessionLog>,
    inbound_throttler: Option<Arc<dyn InboundMsgThrottler>>,
    outbound_throttler: Option<Arc<dyn OutboundMsgThrottler>>,
    network: Option<Arc<dyn PeerNetwork>>,
    router: Option<Arc<dyn InboundHandler>>,
    version_compatibility: Option<VersionCompatibility>,
    version_parser: Option<Arc<dyn VersionParser>>,
    my_subnets: HashSet<SubnetId>,
    beacons: ValidatorSet,
    network_id: Option<u32>,
    ping_frequency: Option<Duration>,
    pong_timeout: Option<Duration>,
    max_clock_difference: Option<Duration>,
    send_queue_size: Option<usize>,
}

impl PeerConfigBuilder {
    pub fn codec(mut self, codec: Arc<MessageCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn metrics(mut self, metrics: PeerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn inbound_throttler(mut self, throttler: Arc<dyn InboundMsgThrottler>) -> Self {
        self.inbound_throttler = Some(throttler);
        self
    }

    pub fn outbound_throttler(mut self, throttler: Arc<dyn OutboundMsgThrottler>) -> Self {
        self.outbound_throttler = Some(throttler);
        self
    }

    pub fn network(mut self, network: Arc<dyn PeerNetwork>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn router(mut self, router: Arc<dyn InboundHandler>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn version_compatibility(mut self, compatibility: VersionCompatibility) -> Self {
        self.version_compatibility = Some(compatibility);
        self
    }

    pub fn version_parser(mut self, parser: Arc<dyn VersionParser>) -> Self {
        self.version_parser = Some(parser);
        self
    }

    pub fn my_subnets(mut self, subnets: impl IntoIterator<Item = SubnetId>) -> Self {
        self.my_subnets = subnets.into_iter().collect();
        self
    }

    pub fn beacons(mut self, beacons: ValidatorSet) -> Self {
        self.beacons = beacons;
        self
    }

    pub fn network_id(mut self, network_id: u32) -> Self {
        self.network_id = Some(network_id);
        self
    }

    pub fn ping_frequency(mut self, frequency: Duration) -> Self {
        self.ping_frequency = Some(frequency);
        self
    }

    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = Some(timeout);
        self
    }

    pub fn max_clock_difference(mut self, difference: Duration) -> Self {
        self.max_clock_difference = Some(difference);
        self
    }

    pub fn send_queue_size(mut self, size: usize) -> Self {
        self.send_queue_size = Some(size);
        self
    }

    /// Validate and assemble the configuration.
    pub fn build(self) -> Result<PeerConfig, ConfigError> {
        let codec = self.codec.ok_or(ConfigError::MissingField("codec"))?;
        let metrics = self.metrics.ok_or(ConfigError::MissingField("metrics"))?;
        let network = self.network.ok_or(ConfigError::MissingField("network"))?;
        let router = self.router.ok_or(ConfigError::MissingField("router"))?;

        let network_id = self.network_id.unwrap_or_else(|| network.network_id());
        if network_id != network.network_id() {
            return Err(ConfigError::Invalid(format!(
                "network id {} does not match network {}",
                network_id,
                network.network_id()
            )));
        }

        let ping_frequency = self.ping_frequency.unwrap_or(DEFAULT_PING_FREQUENCY);
        let pong_timeout = self.pong_timeout.unwrap_or(DEFAULT_PONG_TIMEOUT);
        let max_clock_difference = self
            .max_clock_difference
            .unwrap_or(DEFAULT_MAX_CLOCK_DIFFERENCE);
        let send_queue_size = self.send_queue_size.unwrap_or(DEFAULT_SEND_QUEUE_SIZE);

        if ping_frequency.is_zero() {
            return Err(ConfigError::Invalid("ping frequency must be positive".into()));
        }
        if pong_timeout <= ping_frequency {
            return Err(ConfigError::Invalid(format!(
                "pong timeout {:?} must exceed ping frequency {:?}",
                pong_timeout, ping_frequency
            )));
        }
        if send_queue_size == 0 {
            return Err(ConfigError::Invalid("send queue size must be positive".into()));
        }

        Ok(PeerConfig {
            codec,
            metrics,
            log: self.log.unwrap_or_default(),
            inbound_throttler: self
                .inbound_throttler
                .unwrap_or_else(|| Arc::new(NoInboundThrottler)),
            outbound_throttler: self
                .outbound_throttler
                .unwrap_or_else(|| Arc::new(NoOutboundThrottler)),
            network,
            router,
            version_compatibility: self
                .version_compatibility
                .unwrap_or_else(|| VersionCompatibility::for_network(network_id)),
            version_parser: self
                .version_parser
                .unwrap_or_else(|| Arc::new(DefaultVersionParser)),
            my_subnets: self.my_subnets,
            beacons: self.beacons,
            network_id,
            ping_frequency,
            pong_timeout,
            max_clock_difference,
            send_queue_size,
        })
    }
}
