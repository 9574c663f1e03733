//! # Message Throttling
//!
//! Inbound and outbound throttlers gate traffic per peer. The harness talks
//! to its own nodes and must never be rate-limited, so only the unrestricted
//! implementations are provided.

use async_trait::async_trait;
use shared_types::NodeId;

/// Gates reading of inbound messages.
#[async_trait]
pub trait InboundMsgThrottler: Send + Sync {
    /// Wait until a message of `msg_size` bytes from `node_id` may be read.
    async fn acquire(&self, msg_size: usize, node_id: NodeId);

    /// Return the capacity taken by [`InboundMsgThrottler::acquire`].
    fn release(&self, msg_size: usize, node_id: NodeId);
}

/// Gates queueing of outbound messages.
pub trait OutboundMsgThrottler: Send + Sync {
    /// Returns `false` if the message must be dropped.
    fn acquire(&self, msg_size: usize, node_id: NodeId) -> bool;

    fn release(&self, msg_size: usize, node_id: NodeId);
}

/// Inbound throttler that never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInboundThrottler;

#[async_trait]
impl InboundMsgThrottler for NoInboundThrottler {
    async fn acquire(&self, _msg_size: usize, _node_id: NodeId) {}

    fn release(&self, _msg_size: usize, _node_id: NodeId) {}
}

/// Outbound throttler that never drops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOutboundThrottler;

impl OutboundMsgThrottler for NoOutboundThrottler {
    fn acquire(&self, _msg_size: usize, _node_id: NodeId) -> bool {
        true
    }

    fn release(&self, _msg_size: usize, _node_id: NodeId) {}
}
