//! # Test Utilities
//!
//! An in-process stand-in for a node's peer port: it accepts a raw
//! connection, performs the server side of the TLS upgrade and runs a
//! regular [`PeerSession`] against the attached peer.

use std::sync::Arc;

use prometheus::Registry;
use shared_types::NodeId;
use tokio::sync::mpsc;

use crate::attacher::AttachError;
use crate::codec::{MessageCodec, DEFAULT_MAX_MESSAGE_SIZE};
use crate::config::PeerConfig;
use crate::domain::{EphemeralIdentity, InboundMessage};
use crate::metrics::{PeerMetrics, SessionLog};
use crate::network::TestNetwork;
use crate::ports::{BoxedStream, ChannelHandler};
use crate::session::PeerSession;
use crate::upgrade::TlsServerUpgrader;

/// Node-side peer handling for tests.
pub struct FakeNode {
    identity: EphemeralIdentity,
    network_id: u32,
}

/// A connection accepted by a [`FakeNode`].
pub struct AcceptedPeer {
    pub session: PeerSession,
    pub inbound: mpsc::UnboundedReceiver<InboundMessage>,
}

impl FakeNode {
    pub fn new(network_id: u32) -> Result<Self, AttachError> {
        Ok(Self {
            identity: EphemeralIdentity::generate()?,
            network_id,
        })
    }

    /// Identity an attached peer should derive for this node.
    pub fn node_id(&self) -> NodeId {
        self.identity.node_id()
    }

    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    /// Upgrade `stream` as the accepting side and start a session on it.
    pub async fn accept(&self, stream: BoxedStream) -> Result<AcceptedPeer, AttachError> {
        let registry = Registry::new();
        let (handler, inbound) = ChannelHandler::new();
        let config = PeerConfig::builder()
            .codec(Arc::new(MessageCodec::new(
                &registry,
                "node",
                DEFAULT_MAX_MESSAGE_SIZE,
            )?))
            .metrics(PeerMetrics::new(&SessionLog::noop(), "node", &registry)?)
            .network(Arc::new(TestNetwork::new(
                self.network_id,
                self.identity.signer()?,
            )))
            .router(Arc::new(handler))
            .build()?;

        let upgraded = TlsServerUpgrader::new(&self.identity)?
            .upgrade(stream)
            .await?;
        let session =
            PeerSession::start(config, upgraded.stream, upgraded.cert, upgraded.peer_id)?;
        Ok(AcceptedPeer { session, inbound })
    }
}

impl std::fmt::Debug for FakeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeNode")
            .field("node_id", &self.node_id())
            .field("network_id", &self.network_id)
            .finish()
    }
}
