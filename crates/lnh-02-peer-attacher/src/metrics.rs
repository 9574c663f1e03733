//! # Peer Metrics
//!
//! Per-session counters, registered in the attachment's private registry.

use std::fmt;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::{debug, Dispatch};

use crate::domain::Op;

/// Logger handed to a session.
///
/// Sessions run their tasks under this dispatcher, so [`SessionLog::noop`]
/// silences everything a session would log.
#[derive(Clone)]
pub struct SessionLog(Dispatch);

impl SessionLog {
    /// Discards all events.
    pub fn noop() -> Self {
        Self(Dispatch::none())
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.0
    }

    pub fn is_noop(&self) -> bool {
        self.0.is::<tracing::subscriber::NoSubscriber>()
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionLog")
            .field(&if self.is_noop() { "noop" } else { "active" })
            .finish()
    }
}

/// Traffic counters of one peer session.
#[derive(Clone)]
pub struct PeerMetrics {
    pub messages_sent: IntCounterVec,
    pub messages_received: IntCounterVec,
    pub bytes_sent: IntCounter,
    pub bytes_received: IntCounter,
    pub send_failed: IntCounterVec,
    pub connected: IntGauge,
}

impl PeerMetrics {
    pub fn new(
        log: &SessionLog,
        namespace: &str,
        registry: &Registry,
    ) -> Result<Self, prometheus::Error> {
        let messages_sent = IntCounterVec::new(
            Opts::new("peer_messages_sent_total", "Messages sent, by op").namespace(namespace),
            &["op"],
        )?;
        let messages_received = IntCounterVec::new(
            Opts::new("peer_messages_received_total", "Messages received, by op")
                .namespace(namespace),
            &["op"],
        )?;
        let bytes_sent = IntCounter::with_opts(
            Opts::new("peer_bytes_sent_total", "Frame bytes sent").namespace(namespace),
        )?;
        let bytes_received = IntCounter::with_opts(
            Opts::new("peer_bytes_received_total", "Frame bytes received").namespace(namespace),
        )?;
        let send_failed = IntCounterVec::new(
            Opts::new("peer_send_failed_total", "Messages dropped before sending, by op")
                .namespace(namespace),
            &["op"],
        )?;
        let connected = IntGauge::with_opts(
            Opts::new("peer_connected", "Whether the session completed its handshake")
                .namespace(namespace),
        )?;

        registry.register(Box::new(messages_sent.clone()))?;
        registry.register(Box::new(messages_received.clone()))?;
        registry.register(Box::new(bytes_sent.clone()))?;
        registry.register(Box::new(bytes_received.clone()))?;
        registry.register(Box::new(send_failed.clone()))?;
        registry.register(Box::new(connected.clone()))?;

        tracing::dispatcher::with_default(log.dispatch(), || {
            debug!(namespace, "peer metrics registered");
        });

        Ok(Self {
            messages_sent,
            messages_received,
            bytes_sent,
            bytes_received,
            send_failed,
            connected,
        })
    }

    pub fn sent(&self, op: Op, bytes: usize) {
        self.messages_sent.with_label_values(&[op.as_str()]).inc();
        self.bytes_sent.inc_by(bytes as u64);
    }

    pub fn received(&self, op: Op, bytes: usize) {
        self.messages_received.with_label_values(&[op.as_str()]).inc();
        self.bytes_received.inc_by(bytes as u64);
    }

    pub fn failed(&self, op: Op) {
        self.send_failed.with_label_values(&[op.as_str()]).inc();
    }
}

impl fmt::Debug for PeerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerMetrics")
            .field("bytes_sent", &self.bytes_sent.get())
            .field("bytes_received", &self.bytes_received.get())
            .field("connected", &self.connected.get())
            .finish()
    }
}
