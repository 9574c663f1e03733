//! # Peer Network
//!
//! The view of the surrounding network a session needs: who we are, what we
//! advertise, and which peers we know. A full node backs this with its peer
//! manager. An instrumentation peer only needs [`TestNetwork`], which knows
//! no peers and accepts every connection.

use std::net::{Ipv6Addr, SocketAddr};

use shared_types::NodeId;
use tracing::debug;

use crate::domain::{
    current_version, ip_claim_bytes, ApplicationVersion, ClaimedIpPort, IdentityError,
    IdentitySigner,
};

/// Peer list size used by instrumentation peers.
pub const DEFAULT_PEER_LIST_SIZE: usize = 100;

/// Network-wide state consulted by a session.
pub trait PeerNetwork: Send + Sync {
    fn network_id(&self) -> u32;

    /// Address advertised in our `Version` message.
    fn local_ip(&self) -> SocketAddr;

    fn version(&self) -> &ApplicationVersion;

    /// Sign the claim that we listen on [`PeerNetwork::local_ip`] at `timestamp`.
    fn sign_ip(&self, timestamp: u64) -> Result<Vec<u8>, IdentityError>;

    /// Known peers to gossip in a `PeerList`, at most the configured size.
    fn peers(&self) -> Vec<ClaimedIpPort>;

    /// Called once a session completes its handshake.
    fn connected(&self, node_id: NodeId);

    /// Called when a connected session ends.
    fn disconnected(&self, node_id: NodeId);

    fn allow_connection(&self, node_id: &NodeId) -> bool;
}

/// Minimal network for a single instrumentation peer.
#[derive(Debug)]
pub struct TestNetwork {
    network_id: u32,
    local_ip: SocketAddr,
    version: ApplicationVersion,
    signer: IdentitySigner,
    peer_list_size: usize,
}

impl TestNetwork {
    /// Network on `network_id` advertising the unspecified address and the
    /// current application version.
    pub fn new(network_id: u32, signer: IdentitySigner) -> Self {
        Self {
            network_id,
            local_ip: SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
            version: current_version(),
            signer,
            peer_list_size: DEFAULT_PEER_LIST_SIZE,
        }
    }

    pub fn peer_list_size(&self) -> usize {
        self.peer_list_size
    }
}

impl PeerNetwork for TestNetwork {
    fn network_id(&self) -> u32 {
        self.network_id
    }

    fn local_ip(&self) -> SocketAddr {
        self.local_ip
    }

    fn version(&self) -> &ApplicationVersion {
        &self.version
    }

    fn sign_ip(&self, timestamp: u64) -> Result<Vec<u8>, IdentityError> {
        self.signer.sign(&ip_claim_bytes(&self.local_ip, timestamp))
    }

    fn peers(&self) -> Vec<ClaimedIpPort> {
        Vec::new()
    }

    fn connected(&self, node_id: NodeId) {
        debug!(%node_id, "peer connected");
    }

    fn disconnected(&self, node_id: NodeId) {
        debug!(%node_id, "peer disconnected");
    }

    fn allow_connection(&self, _node_id: &NodeId) -> bool {
        true
    }
}
