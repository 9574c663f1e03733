//! # Test Utilities
//!
//! [`MockConnectionFactory`] hands out pre-seeded streams instead of
//! dialing, so node handles can be attached to in-memory peers.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lnh_02_peer_attacher::BoxedStream;
use parking_lot::Mutex;

use crate::ports::{ConnectionFactory, PeerEndpoint};

/// Scripted [`ConnectionFactory`].
///
/// Each `connect` pops the next queued stream. With an empty queue it
/// fails with `ConnectionRefused`.
#[derive(Default)]
pub struct MockConnectionFactory {
    streams: Mutex<VecDeque<BoxedStream>>,
    endpoints: Mutex<Vec<PeerEndpoint>>,
    calls: AtomicUsize,
}

impl MockConnectionFactory {
    /// A factory that refuses every connection.
    pub fn refusing() -> Self {
        Self::default()
    }

    /// A factory that returns one end of a fresh in-memory pipe and hands
    /// back the other end.
    pub fn pipe() -> (Self, BoxedStream) {
        let (ours, theirs) = tokio::io::duplex(256 * 1024);
        let factory = Self::default();
        factory.push(Box::new(ours));
        (factory, Box::new(theirs))
    }

    pub fn push(&self, stream: BoxedStream) {
        self.streams.lock().push_back(stream);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Endpoints passed to `connect`, in call order.
    pub fn endpoints(&self) -> Vec<PeerEndpoint> {
        self.endpoints.lock().clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(&self, endpoint: PeerEndpoint) -> io::Result<BoxedStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.endpoints.lock().push(endpoint);
        self.streams
            .lock()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "no stream queued"))
    }
}
