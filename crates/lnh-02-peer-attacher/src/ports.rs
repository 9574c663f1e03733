//! # Ports
//!
//! Seams between the attacher and its surroundings: where connections come
//! from and where inbound application messages go.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::domain::InboundMessage;

/// A bidirectional byte stream a session can run over.
pub trait PeerStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> PeerStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased [`PeerStream`].
pub type BoxedStream = Box<dyn PeerStream>;

/// Something the attacher can connect to.
#[async_trait]
pub trait AttachTarget: Send + Sync {
    /// Network the target runs on.
    fn network_id(&self) -> u32;

    /// Open a raw, not yet upgraded connection to the target's peer port.
    async fn get_connection(&self) -> io::Result<BoxedStream>;
}

/// Receives application messages from a peer session.
pub trait InboundHandler: Send + Sync + 'static {
    fn handle_inbound(&self, message: InboundMessage);
}

impl<F> InboundHandler for F
where
    F: Fn(InboundMessage) + Send + Sync + 'static,
{
    fn handle_inbound(&self, message: InboundMessage) {
        self(message)
    }
}

/// Forwards inbound messages into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<InboundMessage>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl InboundHandler for ChannelHandler {
    fn handle_inbound(&self, message: InboundMessage) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(message);
    }
}
