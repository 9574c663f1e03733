//! # Session Messages
//!
//! The minimal message set needed to complete a peer connection and relay
//! application traffic. Only the framing around these messages is fixed;
//! application payloads are opaque bytes.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use shared_types::{NodeId, SubnetId};

/// Length of a chain identifier.
pub const CHAIN_ID_LEN: usize = 32;

/// A signed claim that a certificate holder listens on an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedIpPort {
    pub cert: Vec<u8>,
    pub ip: SocketAddr,
    pub timestamp: u64,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// First message on every connection.
    Version {
        network_id: u32,
        /// Sender's wall clock, unix seconds.
        my_time: u64,
        ip: SocketAddr,
        my_version: String,
        my_version_time: u64,
        /// Signature over the claimed `ip` and `my_time`.
        sig: Vec<u8>,
        tracked_subnets: Vec<SubnetId>,
    },
    /// Sent in reply to a valid `Version`; its receipt completes the handshake.
    PeerList { peers: Vec<ClaimedIpPort> },
    Ping,
    Pong { uptime: u8 },
    AppRequest {
        chain_id: [u8; CHAIN_ID_LEN],
        request_id: u32,
        deadline_ms: u64,
        payload: Vec<u8>,
    },
    AppResponse {
        chain_id: [u8; CHAIN_ID_LEN],
        request_id: u32,
        payload: Vec<u8>,
    },
    AppGossip {
        chain_id: [u8; CHAIN_ID_LEN],
        payload: Vec<u8>,
    },
}

/// Message discriminant, used for metrics labels and routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Version,
    PeerList,
    Ping,
    Pong,
    AppRequest,
    AppResponse,
    AppGossip,
}

impl Op {
    pub const ALL: [Op; 7] = [
        Op::Version,
        Op::PeerList,
        Op::Ping,
        Op::Pong,
        Op::AppRequest,
        Op::AppResponse,
        Op::AppGossip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Version => "version",
            Op::PeerList => "peer_list",
            Op::Ping => "ping",
            Op::Pong => "pong",
            Op::AppRequest => "app_request",
            Op::AppResponse => "app_response",
            Op::AppGossip => "app_gossip",
        }
    }

    /// Whether the op belongs to the connection handshake.
    pub fn is_handshake(&self) -> bool {
        matches!(self, Op::Version | Op::PeerList)
    }

    /// Whether the op is application traffic delivered to the router.
    pub fn is_application(&self) -> bool {
        matches!(self, Op::AppRequest | Op::AppResponse | Op::AppGossip)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    pub fn op(&self) -> Op {
        match self {
            Message::Version { .. } => Op::Version,
            Message::PeerList { .. } => Op::PeerList,
            Message::Ping => Op::Ping,
            Message::Pong { .. } => Op::Pong,
            Message::AppRequest { .. } => Op::AppRequest,
            Message::AppResponse { .. } => Op::AppResponse,
            Message::AppGossip { .. } => Op::AppGossip,
        }
    }
}

/// An application message received from a peer, as handed to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub node_id: NodeId,
    pub op: Op,
    pub message: Message,
}

impl InboundMessage {
    pub fn new(node_id: NodeId, message: Message) -> Self {
        Self {
            node_id,
            op: message.op(),
            message,
        }
    }
}

/// Bytes covered by the signature in a `Version` message.
pub fn ip_claim_bytes(ip: &SocketAddr, timestamp: u64) -> Vec<u8> {
    let mut bytes = ip.to_string().into_bytes();
    bytes.extend_from_slice(&timestamp.to_be_bytes());
    bytes
}
