//! # Peer Session
//!
//! A running, authenticated connection to one peer.
//!
//! ## Tasks
//!
//! ```text
//!                 ┌──────────────┐
//!   stream ──────►│    reader    │──► router (after handshake)
//!                 └──────┬───────┘
//!                        │ replies (PeerList, Pong)
//!                        ▼
//!   send() ─────► outbound queue ──► writer ──► stream
//!                        ▲
//!                 ┌──────┴───────┐
//!                 │  heartbeat   │  Ping every ping_frequency,
//!                 └──────────────┘  closes after pong_timeout of silence
//! ```
//!
//! The three tasks live in a `JoinSet` owned by a supervising task. The
//! first task to stop flips the shared shutdown flag, the rest follow, and
//! the supervisor then publishes the close reason. Dropping the
//! [`PeerSession`] aborts the supervisor, which aborts every task.
//!
//! ## Handshake
//!
//! Each side sends `Version` on start. A valid `Version` is answered with
//! `PeerList`, and a `PeerList` received after a valid `Version` completes
//! the handshake. Until then every other message is dropped.

mod handshake;

pub use handshake::RejectReason;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustls::pki_types::CertificateDer;
use shared_types::NodeId;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::codec::CodecError;
use crate::config::PeerConfig;
use crate::domain::{ApplicationVersion, IdentityError, InboundMessage, Message, Op};
use crate::ports::BoxedStream;

use handshake::{unix_now, validate_version};

/// Uptime reported in `Pong`. An instrumentation peer has no stake to
/// measure uptime against.
const REPORTED_UPTIME: u8 = 100;

/// Time the writer gets to flush a close notification.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum StartError {
    #[error("no tokio runtime: {0}")]
    Runtime(String),

    #[error("failed to sign ip claim: {0}")]
    Sign(#[from] IdentityError),

    #[error("failed to encode version message: {0}")]
    Codec(#[from] CodecError),

    #[error("outbound queue rejected the version message")]
    Queue,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseReason {
    #[error("closed locally")]
    Requested,

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("handshake rejected: {0}")]
    Rejected(RejectReason),

    #[error("no message from peer within pong timeout")]
    PongTimeout,

    #[error("malformed traffic: {0}")]
    Codec(String),

    #[error("i/o failure: {0}")]
    Io(String),
}

struct Outbound {
    op: Op,
    body: Vec<u8>,
}

#[derive(Debug, Default)]
struct HandshakeState {
    got_version: bool,
    finished: bool,
    peer_version: Option<ApplicationVersion>,
}

/// State shared by the session handle and its tasks.
struct SessionCtx {
    config: PeerConfig,
    peer_id: NodeId,
    cert: CertificateDer<'static>,
    outbound: mpsc::Sender<Outbound>,
    handshake: Mutex<HandshakeState>,
    close_reason: Mutex<Option<CloseReason>>,
    last_received: Mutex<Instant>,
    shutdown: watch::Sender<bool>,
    ready: watch::Sender<bool>,
    closed: watch::Sender<bool>,
}

impl SessionCtx {
    /// Record `reason` unless one is already set, and stop all tasks.
    fn close(&self, reason: CloseReason) {
        {
            let mut current = self.close_reason.lock();
            if current.is_none() {
                debug!(%reason, "closing session");
                *current = Some(reason);
            }
        }
        self.shutdown.send_replace(true);
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    fn touch(&self) {
        *self.last_received.lock() = Instant::now();
    }

    fn silence(&self) -> Duration {
        self.last_received.lock().elapsed()
    }

    /// Queue `message` for the writer. Returns `false` if it was dropped.
    fn enqueue(&self, message: Message) -> bool {
        let op = message.op();
        if self.is_shutting_down() {
            self.config.metrics.failed(op);
            return false;
        }

        let body = match self.config.codec.encode(&message) {
            Ok(body) => body,
            Err(e) => {
                debug!(%op, error = %e, "dropping unencodable message");
                self.config.metrics.failed(op);
                return false;
            }
        };

        let size = body.len();
        if !self.config.outbound_throttler.acquire(size, self.peer_id) {
            self.config.metrics.failed(op);
            return false;
        }
        if self.outbound.try_send(Outbound { op, body }).is_err() {
            self.config.outbound_throttler.release(size, self.peer_id);
            self.config.metrics.failed(op);
            return false;
        }
        true
    }

    /// Process one inbound message. Returns `false` once the session is
    /// closing.
    fn handle(&self, message: Message) -> bool {
        match message {
            Message::Version { .. } => return self.handle_version(&message),
            Message::PeerList { peers } => self.handle_peer_list(peers.len()),
            Message::Ping => {
                if self.is_ready() {
                    self.enqueue(Message::Pong {
                        uptime: REPORTED_UPTIME,
                    });
                } else {
                    trace!("dropping ping before handshake");
                }
            }
            Message::Pong { .. } => {}
            app => {
                if self.is_ready() {
                    self.config
                        .router
                        .handle_inbound(InboundMessage::new(self.peer_id, app));
                } else {
                    debug!(op = %app.op(), "dropping message before handshake");
                }
            }
        }
        !self.is_shutting_down()
    }

    fn handle_version(&self, message: &Message) -> bool {
        let result = if self.handshake.lock().got_version {
            Err(RejectReason::DuplicateVersion)
        } else if !self.is_admitted() {
            Err(RejectReason::NotAllowed)
        } else {
            validate_version(&self.config, message, &self.cert, unix_now())
        };

        match result {
            Ok(version) => {
                debug!(peer_version = %version, "version accepted");
                {
                    let mut state = self.handshake.lock();
                    state.got_version = true;
                    state.peer_version = Some(version);
                }
                self.enqueue(Message::PeerList {
                    peers: self.config.network.peers(),
                })
            }
            Err(reason) => {
                warn!(%reason, "rejecting peer");
                self.close(CloseReason::Rejected(reason));
                false
            }
        }
    }

    /// Beacons are always admitted; anyone else needs the network's consent.
    fn is_admitted(&self) -> bool {
        self.config.beacons.contains(&self.peer_id)
            || self.config.network.allow_connection(&self.peer_id)
    }

    fn handle_peer_list(&self, peers: usize) {
        {
            let mut state = self.handshake.lock();
            if state.finished {
                trace!(peers, "peer list gossip");
                return;
            }
            if !state.got_version {
                debug!("dropping peer list before version");
                return;
            }
            state.finished = true;
        }

        self.config.metrics.connected.set(1);
        self.config.network.connected(self.peer_id);
        self.ready.send_replace(true);
        info!(peer_id = %self.peer_id, "peer handshake complete");
    }
}

/// A running peer connection.
pub struct PeerSession {
    ctx: Arc<SessionCtx>,
    supervisor: JoinHandle<()>,
}

impl PeerSession {
    /// Spawn the session tasks over an authenticated `stream` and send our
    /// `Version`. Returns without waiting for the handshake.
    pub fn start(
        config: PeerConfig,
        stream: BoxedStream,
        cert: CertificateDer<'static>,
        peer_id: NodeId,
    ) -> Result<Self, StartError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StartError::Runtime(e.to_string()))?;

        let now = unix_now();
        let network = config.network.clone();
        let mut tracked_subnets: Vec<_> = config.my_subnets.iter().copied().collect();
        tracked_subnets.sort();
        let version = Message::Version {
            network_id: config.network_id,
            my_time: now,
            ip: network.local_ip(),
            my_version: network.version().to_string(),
            my_version_time: now,
            sig: network.sign_ip(now)?,
            tracked_subnets,
        };
        let version_body = config.codec.encode(&version)?;

        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_queue_size);
        outbound_tx
            .try_send(Outbound {
                op: Op::Version,
                body: version_body,
            })
            .map_err(|_| StartError::Queue)?;

        let (shutdown, _) = watch::channel(false);
        let (ready, _) = watch::channel(false);
        let (closed, _) = watch::channel(false);
        let dispatch = config.log.dispatch().clone();

        let ctx = Arc::new(SessionCtx {
            config,
            peer_id,
            cert,
            outbound: outbound_tx,
            handshake: Mutex::new(HandshakeState::default()),
            close_reason: Mutex::new(None),
            last_received: Mutex::new(Instant::now()),
            shutdown,
            ready,
            closed,
        });

        let span = tracing::dispatcher::with_default(&dispatch, || {
            info_span!("peer_session", peer_id = %peer_id)
        });
        let (reader, writer) = tokio::io::split(stream);

        let mut tasks = JoinSet::new();
        tasks.spawn_on(
            read_loop(ctx.clone(), reader)
                .instrument(span.clone())
                .with_subscriber(dispatch.clone()),
            &runtime,
        );
        tasks.spawn_on(
            write_loop(ctx.clone(), writer, outbound_rx)
                .instrument(span.clone())
                .with_subscriber(dispatch.clone()),
            &runtime,
        );
        tasks.spawn_on(
            heartbeat_loop(ctx.clone())
                .instrument(span.clone())
                .with_subscriber(dispatch.clone()),
            &runtime,
        );
        let supervisor = runtime.spawn(
            supervise(ctx.clone(), tasks)
                .instrument(span)
                .with_subscriber(dispatch),
        );

        Ok(Self { ctx, supervisor })
    }

    /// Node identity of the remote peer.
    pub fn id(&self) -> NodeId {
        self.ctx.peer_id
    }

    /// Certificate the remote peer presented.
    pub fn cert(&self) -> &CertificateDer<'static> {
        &self.ctx.cert
    }

    /// The peer's version, once its `Version` message was accepted.
    pub fn peer_version(&self) -> Option<ApplicationVersion> {
        self.ctx.handshake.lock().peer_version.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.ctx.is_ready()
    }

    pub fn is_closed(&self) -> bool {
        *self.ctx.closed.borrow()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.ctx.close_reason.lock().clone()
    }

    /// Queue `message` for sending. Returns `false` if it was dropped
    /// because the session is closing, the queue is full or a throttler
    /// refused it.
    pub fn send(&self, message: Message) -> bool {
        self.ctx.enqueue(message)
    }

    /// Begin closing the session. Await [`PeerSession::closed`] to observe
    /// completion.
    pub fn close(&self) {
        self.ctx.close(CloseReason::Requested);
    }

    /// Resolves once the handshake completes (`true`) or the session
    /// closes first (`false`).
    pub async fn ready(&self) -> bool {
        let mut ready = self.ctx.ready.subscribe();
        let mut closed = self.ctx.closed.subscribe();
        tokio::select! {
            _ = ready.wait_for(|r| *r) => {}
            _ = closed.wait_for(|c| *c) => {}
        }
        self.is_ready()
    }

    /// Resolves once every session task has stopped.
    pub async fn closed(&self) -> CloseReason {
        let mut closed = self.ctx.closed.subscribe();
        // The sender lives in `ctx`, which `self` keeps alive.
        let _ = closed.wait_for(|c| *c).await;
        self.close_reason().unwrap_or(CloseReason::Requested)
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

impl fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSession")
            .field("peer_id", &self.ctx.peer_id)
            .field("ready", &self.is_ready())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tasks
// =============================================================================

async fn supervise(ctx: Arc<SessionCtx>, mut tasks: JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            ctx.close(CloseReason::Io(format!("session task failed: {}", e)));
        }
        // One task stopping ends the session.
        ctx.shutdown.send_replace(true);
    }

    if ctx.handshake.lock().finished {
        ctx.config.metrics.connected.set(0);
        ctx.config.network.disconnected(ctx.peer_id);
    }
    let reason = ctx
        .close_reason
        .lock()
        .get_or_insert(CloseReason::Requested)
        .clone();
    info!(%reason, "peer session closed");
    ctx.closed.send_replace(true);
}

async fn read_loop(ctx: Arc<SessionCtx>, mut reader: ReadHalf<BoxedStream>) {
    let mut shutdown = ctx.shutdown.subscribe();
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => return,
            frame = ctx.config.codec.read_frame(&mut reader) => frame,
        };

        match frame {
            Ok((message, size)) => {
                ctx.config.metrics.received(message.op(), size);
                ctx.touch();
                ctx.config.inbound_throttler.acquire(size, ctx.peer_id).await;
                let open = ctx.handle(message);
                ctx.config.inbound_throttler.release(size, ctx.peer_id);
                if !open {
                    return;
                }
            }
            Err(CodecError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                ctx.close(CloseReason::PeerClosed);
                return;
            }
            Err(CodecError::Io(e)) => {
                warn!(error = %e, "read failed");
                ctx.close(CloseReason::Io(e.to_string()));
                return;
            }
            Err(e) => {
                warn!(error = %e, "malformed frame from peer");
                ctx.close(CloseReason::Codec(e.to_string()));
                return;
            }
        }
    }
}

async fn write_loop(
    ctx: Arc<SessionCtx>,
    mut writer: WriteHalf<BoxedStream>,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    let mut shutdown = ctx.shutdown.subscribe();
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => break,
            next = outbound.recv() => next,
        };
        let Some(Outbound { op, body }) = next else {
            break;
        };

        let result = ctx.config.codec.write_frame(&mut writer, &body).await;
        ctx.config.outbound_throttler.release(body.len(), ctx.peer_id);
        match result {
            Ok(()) => ctx.config.metrics.sent(op, body.len()),
            Err(e) => {
                warn!(%op, error = %e, "write failed");
                ctx.close(CloseReason::Io(e.to_string()));
                break;
            }
        }
    }

    let _ = tokio::time::timeout(CLOSE_GRACE, writer.shutdown()).await;
}

async fn heartbeat_loop(ctx: Arc<SessionCtx>) {
    let mut shutdown = ctx.shutdown.subscribe();
    let period = ctx.config.ping_frequency.min(ctx.config.pong_timeout);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => return,
            _ = ticker.tick() => {}
        }

        if ctx.silence() > ctx.config.pong_timeout {
            warn!(timeout = ?ctx.config.pong_timeout, "peer went silent");
            ctx.close(CloseReason::PongTimeout);
            return;
        }
        if ctx.is_ready() {
            ctx.enqueue(Message::Ping);
        }
    }
}

#[cfg(test)]
mod tests;
