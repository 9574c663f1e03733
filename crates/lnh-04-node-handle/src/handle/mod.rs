//! # Node Handle
//!
//! Everything the harness knows about one running node: its identity, its
//! ports, the process it runs in and how to reach it.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use lnh_01_process_supervisor::{NodeProcess, ProcessState, ProcessSupervisor};
use lnh_02_peer_attacher::{AttachTarget, BoxedStream, InboundHandler, PeerAttacher, PeerSession};
use shared_types::{network_name, NodeId};
use tracing::info;

use crate::config::LocalNodeConfig;
use crate::dialer::LoopbackDialer;
use crate::error::NodeError;
use crate::ports::{ApiClient, ConnectionFactory, HttpApiClient, PeerEndpoint};

/// Address every local node listens on.
pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// A locally running node.
pub struct NodeHandle {
    name: String,
    node_id: OnceLock<NodeId>,
    network_id: u32,
    api_port: u16,
    p2p_port: u16,
    process: Box<dyn NodeProcess>,
    api_client: Arc<dyn ApiClient>,
    connection_factory: Arc<dyn ConnectionFactory>,
}

impl NodeHandle {
    /// Handle for a node running as `process`, reachable on the loopback
    /// address.
    pub fn new(
        name: impl Into<String>,
        network_id: u32,
        api_port: u16,
        p2p_port: u16,
        process: Box<dyn NodeProcess>,
    ) -> Self {
        Self {
            name: name.into(),
            node_id: OnceLock::new(),
            network_id,
            api_port,
            p2p_port,
            process,
            api_client: Arc::new(HttpApiClient::new(LOOPBACK, api_port)),
            connection_factory: Arc::new(LoopbackDialer),
        }
    }

    /// Handle whose process is launched from `config`.
    pub fn from_config(
        name: impl Into<String>,
        network_id: u32,
        api_port: u16,
        p2p_port: u16,
        config: LocalNodeConfig,
    ) -> Self {
        let process = ProcessSupervisor::new(config.into());
        Self::new(name, network_id, api_port, p2p_port, Box::new(process))
    }

    /// Replace the default loopback dialer.
    pub fn with_connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.connection_factory = factory;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's identity, once known.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id.get().copied()
    }

    /// Record the node's identity.
    ///
    /// Setting the same id again is a no-op. A different id is refused.
    pub fn set_node_id(&self, node_id: NodeId) -> Result<(), NodeError> {
        let current = *self.node_id.get_or_init(|| node_id);
        if current == node_id {
            Ok(())
        } else {
            Err(NodeError::NodeIdConflict {
                current,
                attempted: node_id,
            })
        }
    }

    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    pub fn api_client(&self) -> Arc<dyn ApiClient> {
        self.api_client.clone()
    }

    /// Host the node listens on.
    pub fn url(&self) -> String {
        LOOPBACK.to_string()
    }

    pub fn api_port(&self) -> u16 {
        self.api_port
    }

    pub fn p2p_port(&self) -> u16 {
        self.p2p_port
    }

    pub fn peer_endpoint(&self) -> PeerEndpoint {
        PeerEndpoint {
            ip: LOOPBACK,
            port: self.p2p_port,
        }
    }

    pub fn process(&self) -> &dyn NodeProcess {
        self.process.as_ref()
    }

    pub fn state(&self) -> ProcessState {
        self.process.state()
    }

    /// Open a raw connection to the node's peer port.
    pub async fn get_connection(&self) -> io::Result<BoxedStream> {
        self.connection_factory.connect(self.peer_endpoint()).await
    }

    pub async fn start(&self) -> Result<(), NodeError> {
        self.process.start().await?;
        info!(
            node = %self.name,
            network = %network_name(self.network_id),
            "node started"
        );
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), NodeError> {
        self.process.stop().await?;
        info!(node = %self.name, "node stop requested");
        Ok(())
    }

    pub async fn wait(&self) -> Result<(), NodeError> {
        let result = self.process.wait().await;
        info!(node = %self.name, ok = result.is_ok(), "node exited");
        Ok(result?)
    }

    /// Attach an instrumentation peer, routing inbound application messages
    /// to `handler`. Records the node's identity as derived from its
    /// certificate.
    pub async fn attach_peer(
        &self,
        handler: Arc<dyn InboundHandler>,
        handshake_timeout: Duration,
    ) -> Result<PeerSession, NodeError> {
        let session = PeerAttacher::new()
            .with_handshake_timeout(handshake_timeout)
            .attach(self, handler)
            .await?;

        if let Err(e) = self.set_node_id(session.id()) {
            session.close();
            return Err(e);
        }
        Ok(session)
    }
}

#[async_trait]
impl AttachTarget for NodeHandle {
    fn network_id(&self) -> u32 {
        self.network_id
    }

    async fn get_connection(&self) -> io::Result<BoxedStream> {
        NodeHandle::get_connection(self).await
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.name)
            .field("node_id", &self.node_id())
            .field("network_id", &self.network_id)
            .field("api_port", &self.api_port)
            .field("p2p_port", &self.p2p_port)
            .field("state", &self.process.state())
            .finish_non_exhaustive()
    }
}
