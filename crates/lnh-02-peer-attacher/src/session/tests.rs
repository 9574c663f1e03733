use std::net::SocketAddr;
use std::time::Duration;

use prometheus::Registry;
use shared_types::{KOPERNIKUS_ID, LOCAL_ID};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc::UnboundedReceiver;

use super::*;
use crate::codec::{MessageCodec, DEFAULT_MAX_MESSAGE_SIZE};
use crate::domain::{
    current_version, ip_claim_bytes, ClaimedIpPort, EphemeralIdentity, ValidatorSet,
    VersionError, CHAIN_ID_LEN,
};
use crate::metrics::{PeerMetrics, SessionLog};
use crate::network::{PeerNetwork, TestNetwork};
use crate::ports::ChannelHandler;

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Helpers
// =============================================================================

struct Side {
    identity: EphemeralIdentity,
    inbound: UnboundedReceiver<InboundMessage>,
    config: PeerConfig,
}

fn side(network_id: u32) -> Side {
    side_with_timing(network_id, None)
}

fn side_with_timing(network_id: u32, timing: Option<(Duration, Duration)>) -> Side {
    let registry = Registry::new();
    let identity = EphemeralIdentity::generate().unwrap();
    let (handler, inbound) = ChannelHandler::new();

    let mut builder = PeerConfig::builder()
        .codec(Arc::new(
            MessageCodec::new(&registry, "", DEFAULT_MAX_MESSAGE_SIZE).unwrap(),
        ))
        .metrics(PeerMetrics::new(&SessionLog::noop(), "", &registry).unwrap())
        .network(Arc::new(TestNetwork::new(
            network_id,
            identity.signer().unwrap(),
        )))
        .router(Arc::new(handler))
        .network_id(network_id);
    if let Some((ping, pong)) = timing {
        builder = builder.ping_frequency(ping).pong_timeout(pong);
    }

    Side {
        identity,
        inbound,
        config: builder.build().unwrap(),
    }
}

/// Two sessions talking to each other over an in-memory pipe.
fn connected_pair(network_id: u32) -> ((PeerSession, Side), (PeerSession, Side)) {
    let a = side(network_id);
    let b = side(network_id);
    let (a_io, b_io) = tokio::io::duplex(256 * 1024);

    let session_a = PeerSession::start(
        a.config.clone(),
        Box::new(a_io),
        b.identity.certificate().clone(),
        b.identity.node_id(),
    )
    .unwrap();
    let session_b = PeerSession::start(
        b.config.clone(),
        Box::new(b_io),
        a.identity.certificate().clone(),
        a.identity.node_id(),
    )
    .unwrap();

    ((session_a, a), (session_b, b))
}

/// Hand-driven peer speaking raw frames.
struct RawPeer {
    io: DuplexStream,
    codec: MessageCodec,
    identity: EphemeralIdentity,
}

impl RawPeer {
    fn new(io: DuplexStream, identity: EphemeralIdentity) -> Self {
        Self {
            io,
            codec: MessageCodec::new(&Registry::new(), "", DEFAULT_MAX_MESSAGE_SIZE).unwrap(),
            identity,
        }
    }

    /// A `Version` whose ip claim is signed with this peer's identity.
    fn version(&self, network_id: u32, my_time: u64, my_version: &str) -> Message {
        signed_version(&self.identity, network_id, my_time, my_version)
    }

    async fn send(&mut self, message: &Message) {
        let body = self.codec.encode(message).unwrap();
        self.codec.write_frame(&mut self.io, &body).await.unwrap();
    }

    async fn recv(&mut self) -> Message {
        tokio::time::timeout(WAIT, self.codec.read_frame(&mut self.io))
            .await
            .expect("peer frame within timeout")
            .unwrap()
            .0
    }

    /// Drain the stream until the session's end is gone. True on a clean EOF.
    async fn read_to_eof(&mut self) -> bool {
        let mut buf = [0u8; 1024];
        tokio::time::timeout(WAIT, async {
            loop {
                match self.io.read(&mut buf).await {
                    Ok(0) => return true,
                    Ok(_) => continue,
                    Err(_) => return false,
                }
            }
        })
        .await
        .expect("stream released within timeout")
    }

    /// Read until a message with `op` arrives.
    async fn recv_op(&mut self, op: Op) -> Message {
        loop {
            let message = self.recv().await;
            if message.op() == op {
                return message;
            }
        }
    }
}

fn signed_version(
    identity: &EphemeralIdentity,
    network_id: u32,
    my_time: u64,
    my_version: &str,
) -> Message {
    let ip: SocketAddr = "127.0.0.1:9651".parse().unwrap();
    let sig = identity
        .signer()
        .unwrap()
        .sign(&ip_claim_bytes(&ip, my_time))
        .unwrap();
    Message::Version {
        network_id,
        my_time,
        ip,
        my_version: my_version.to_string(),
        my_version_time: my_time,
        sig,
        tracked_subnets: Vec::new(),
    }
}

fn gossip(byte: u8) -> Message {
    Message::AppGossip {
        chain_id: [0u8; CHAIN_ID_LEN],
        payload: vec![byte],
    }
}

/// Network that refuses every peer.
struct RefusingNetwork(TestNetwork);

impl PeerNetwork for RefusingNetwork {
    fn network_id(&self) -> u32 {
        self.0.network_id()
    }

    fn local_ip(&self) -> SocketAddr {
        self.0.local_ip()
    }

    fn version(&self) -> &ApplicationVersion {
        self.0.version()
    }

    fn sign_ip(&self, timestamp: u64) -> Result<Vec<u8>, IdentityError> {
        self.0.sign_ip(timestamp)
    }

    fn peers(&self) -> Vec<ClaimedIpPort> {
        Vec::new()
    }

    fn connected(&self, _node_id: NodeId) {}

    fn disconnected(&self, _node_id: NodeId) {}

    fn allow_connection(&self, _node_id: &NodeId) -> bool {
        false
    }
}

fn refusing_config(beacons: ValidatorSet) -> PeerConfig {
    let registry = Registry::new();
    let identity = EphemeralIdentity::generate().unwrap();
    let (handler, _inbound) = ChannelHandler::new();
    let network = TestNetwork::new(LOCAL_ID, identity.signer().unwrap());

    PeerConfig::builder()
        .codec(Arc::new(
            MessageCodec::new(&registry, "", DEFAULT_MAX_MESSAGE_SIZE).unwrap(),
        ))
        .metrics(PeerMetrics::new(&SessionLog::noop(), "", &registry).unwrap())
        .network(Arc::new(RefusingNetwork(network)))
        .router(Arc::new(handler))
        .beacons(beacons)
        .network_id(LOCAL_ID)
        .build()
        .unwrap()
}

fn start_against_raw(config: PeerConfig) -> (PeerSession, RawPeer) {
    start_against(config, EphemeralIdentity::generate().unwrap())
}

fn start_against(config: PeerConfig, remote: EphemeralIdentity) -> (PeerSession, RawPeer) {
    let (session_io, raw_io) = tokio::io::duplex(256 * 1024);
    let session = PeerSession::start(
        config,
        Box::new(session_io),
        remote.certificate().clone(),
        remote.node_id(),
    )
    .unwrap();
    (session, RawPeer::new(raw_io, remote))
}

async fn closed_within(session: &PeerSession) -> CloseReason {
    tokio::time::timeout(WAIT, session.closed())
        .await
        .expect("session closes within timeout")
}

// =============================================================================
// Handshake
// =============================================================================

#[tokio::test]
async fn test_handshake_completes_between_sessions() {
    let ((a, a_side), (b, b_side)) = connected_pair(LOCAL_ID);

    assert!(tokio::time::timeout(WAIT, a.ready()).await.unwrap());
    assert!(tokio::time::timeout(WAIT, b.ready()).await.unwrap());

    assert_eq!(a.id(), b_side.identity.node_id());
    assert_eq!(b.id(), a_side.identity.node_id());
    assert_eq!(a.peer_version(), Some(current_version()));
    assert_eq!(a_side.config.metrics.connected.get(), 1);
    assert!(!a.is_closed());
}

#[tokio::test]
async fn test_session_sends_version_first() {
    let (_session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    match raw.recv().await {
        Message::Version {
            network_id,
            my_version,
            sig,
            ..
        } => {
            assert_eq!(network_id, LOCAL_ID);
            assert_eq!(my_version, current_version().to_string());
            assert!(!sig.is_empty());
        }
        other => panic!("expected version, got {:?}", other.op()),
    }
}

#[tokio::test]
async fn test_app_messages_before_handshake_are_dropped() {
    let mut local = side(LOCAL_ID);
    let (session, mut raw) = start_against_raw(local.config.clone());

    raw.send(&gossip(1)).await;
    let version = raw.version(LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&version).await;
    raw.recv_op(Op::PeerList).await;
    raw.send(&Message::PeerList { peers: Vec::new() }).await;
    assert!(tokio::time::timeout(WAIT, session.ready()).await.unwrap());
    raw.send(&gossip(2)).await;

    let delivered = tokio::time::timeout(WAIT, local.inbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered.message, gossip(2));
    assert_eq!(delivered.node_id, session.id());
    assert!(local.inbound.try_recv().is_err());
}

#[tokio::test]
async fn test_peer_list_before_version_does_not_complete_handshake() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    raw.send(&Message::PeerList { peers: Vec::new() }).await;
    raw.send(&Message::Ping).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!session.is_ready());
    assert!(session.peer_version().is_none());
}

#[tokio::test]
async fn test_wrong_network_id_disconnects() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let version = raw.version(KOPERNIKUS_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&version).await;

    assert_eq!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::NetworkMismatch {
            ours: LOCAL_ID,
            theirs: KOPERNIKUS_ID,
        })
    );
    assert!(!session.is_ready());
}

#[tokio::test]
async fn test_rejected_handshake_releases_stream() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let version = raw.version(KOPERNIKUS_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&version).await;

    assert!(matches!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::NetworkMismatch { .. })
    ));
    // Session handle still alive; its tasks alone held the stream.
    assert!(raw.read_to_eof().await);
    drop(session);
}

#[tokio::test]
async fn test_refused_peer_disconnects() {
    let (session, mut raw) = start_against_raw(refusing_config(ValidatorSet::new()));

    let version = raw.version(LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&version).await;

    assert_eq!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::NotAllowed)
    );
}

#[tokio::test]
async fn test_beacon_admitted_despite_refusing_network() {
    let remote = EphemeralIdentity::generate().unwrap();
    let mut beacons = ValidatorSet::new();
    beacons.add_weight(remote.node_id(), 1);
    let (session, mut raw) = start_against(refusing_config(beacons), remote);

    let version = raw.version(LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&version).await;
    raw.send(&Message::PeerList { peers: Vec::new() }).await;

    assert!(tokio::time::timeout(WAIT, session.ready()).await.unwrap());
    assert!(!session.is_closed());
}

#[tokio::test]
async fn test_clock_skew_disconnects() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let version = raw.version(LOCAL_ID, handshake::unix_now() - 3600, "camino/1.4.10");
    raw.send(&version).await;

    assert!(matches!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::ClockSkew { limit_secs: 60, .. })
    ));
}

#[tokio::test]
async fn test_incompatible_version_disconnects() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let version = raw.version(LOCAL_ID, handshake::unix_now(), "camino/0.9.0");
    raw.send(&version).await;

    assert!(matches!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::Version(VersionError::MajorMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_unsigned_ip_claim_disconnects() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let mut message = raw.version(LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    if let Message::Version { sig, .. } = &mut message {
        sig.clear();
    }
    raw.send(&message).await;

    assert_eq!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::UnsignedIpClaim)
    );
}

#[tokio::test]
async fn test_forged_ip_claim_disconnects() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    // Signed by a key other than the one behind the presented certificate.
    let impostor = EphemeralIdentity::generate().unwrap();
    let forged = signed_version(&impostor, LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&forged).await;

    assert_eq!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::InvalidIpClaimSignature)
    );
    assert!(!session.is_ready());
}

#[tokio::test]
async fn test_tampered_ip_claim_disconnects() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let mut message = raw.version(LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    if let Message::Version { ip, .. } = &mut message {
        *ip = "10.0.0.1:9651".parse().unwrap();
    }
    raw.send(&message).await;

    assert_eq!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::InvalidIpClaimSignature)
    );
}

#[tokio::test]
async fn test_duplicate_version_disconnects() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let message = raw.version(LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&message).await;
    raw.send(&message).await;

    assert_eq!(
        closed_within(&session).await,
        CloseReason::Rejected(RejectReason::DuplicateVersion)
    );
}

// =============================================================================
// Traffic
// =============================================================================

#[tokio::test]
async fn test_app_gossip_reaches_router() {
    let ((a, _a_side), (b, mut b_side)) = connected_pair(LOCAL_ID);
    assert!(tokio::time::timeout(WAIT, a.ready()).await.unwrap());
    assert!(tokio::time::timeout(WAIT, b.ready()).await.unwrap());

    assert!(a.send(gossip(7)));

    let delivered = tokio::time::timeout(WAIT, b_side.inbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered.op, Op::AppGossip);
    assert_eq!(delivered.message, gossip(7));
    assert_eq!(delivered.node_id, b.id());
}

#[tokio::test]
async fn test_ping_answered_with_pong() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let version = raw.version(LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&version).await;
    raw.recv_op(Op::PeerList).await;
    raw.send(&Message::PeerList { peers: Vec::new() }).await;
    assert!(tokio::time::timeout(WAIT, session.ready()).await.unwrap());

    raw.send(&Message::Ping).await;
    assert_eq!(
        raw.recv_op(Op::Pong).await,
        Message::Pong {
            uptime: REPORTED_UPTIME
        }
    );
}

#[tokio::test]
async fn test_silent_peer_times_out() {
    let config = side_with_timing(
        LOCAL_ID,
        Some((Duration::from_millis(50), Duration::from_millis(200))),
    )
    .config;
    let (session, _raw) = start_against_raw(config);

    assert_eq!(closed_within(&session).await, CloseReason::PongTimeout);
}

#[tokio::test]
async fn test_heartbeat_pings_after_handshake() {
    let config = side_with_timing(
        LOCAL_ID,
        Some((Duration::from_millis(50), Duration::from_secs(5))),
    )
    .config;
    let (session, mut raw) = start_against_raw(config);

    let version = raw.version(LOCAL_ID, handshake::unix_now(), "camino/1.4.10");
    raw.send(&version).await;
    raw.recv_op(Op::PeerList).await;
    raw.send(&Message::PeerList { peers: Vec::new() }).await;
    assert!(tokio::time::timeout(WAIT, session.ready()).await.unwrap());

    assert_eq!(raw.recv_op(Op::Ping).await, Message::Ping);
}

#[tokio::test]
async fn test_oversized_frame_closes_session() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);

    let len = (DEFAULT_MAX_MESSAGE_SIZE as u32) + 1;
    raw.io.write_all(&len.to_be_bytes()).await.unwrap();

    assert!(matches!(
        closed_within(&session).await,
        CloseReason::Codec(_)
    ));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_close_is_observed_by_both_sides() {
    let ((a, a_side), (b, _b_side)) = connected_pair(LOCAL_ID);
    assert!(tokio::time::timeout(WAIT, a.ready()).await.unwrap());

    a.close();
    assert_eq!(closed_within(&a).await, CloseReason::Requested);
    assert_eq!(closed_within(&b).await, CloseReason::PeerClosed);
    assert!(a.is_closed());
    assert_eq!(a_side.config.metrics.connected.get(), 0);
    assert!(!a.send(gossip(1)));
}

#[tokio::test]
async fn test_peer_hangup_closes_session() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);
    raw.recv_op(Op::Version).await;
    drop(raw);

    assert_eq!(closed_within(&session).await, CloseReason::PeerClosed);
    assert!(!tokio::time::timeout(WAIT, session.ready()).await.unwrap());
}

#[tokio::test]
async fn test_drop_cancels_tasks() {
    let (session, mut raw) = start_against_raw(side(LOCAL_ID).config);
    raw.recv_op(Op::Version).await;

    drop(session);

    assert!(raw.read_to_eof().await, "stream must be released after drop");
}

#[test]
fn test_start_requires_runtime() {
    let (io, _other) = tokio::io::duplex(64);
    let remote = EphemeralIdentity::generate().unwrap();
    let result = PeerSession::start(
        side(LOCAL_ID).config,
        Box::new(io),
        remote.certificate().clone(),
        remote.node_id(),
    );
    assert!(matches!(result, Err(StartError::Runtime(_))));
}
