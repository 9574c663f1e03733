//! # Peer Attachment
//!
//! Attaching instrumentation peers to a node's peer port over real loopback
//! TCP, with the node side served in-process.

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use lnh_01_process_supervisor::MockProcess;
    use lnh_02_peer_attacher::domain::ip_claim_bytes;
    use lnh_02_peer_attacher::{
        AttachError, ChannelHandler, CloseReason, EphemeralIdentity, InboundHandler,
        InboundMessage, Message, MessageCodec, Op, RejectReason, TlsServerUpgrader,
        CHAIN_ID_LEN, DEFAULT_MAX_MESSAGE_SIZE,
    };
    use lnh_04_node_handle::{NodeError, NodeHandle, LOOPBACK};
    use prometheus::Registry;
    use shared_types::{KOPERNIKUS_ID, LOCAL_ID};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use crate::fixtures::{closed_port, LoopbackNode};

    const WAIT: Duration = Duration::from_secs(10);

    fn handle_for(network_id: u32, p2p_port: u16) -> NodeHandle {
        NodeHandle::new(
            "attach-target",
            network_id,
            9650,
            p2p_port,
            Box::new(MockProcess::default()),
        )
    }

    fn gossip(payload: &[u8]) -> Message {
        Message::AppGossip {
            chain_id: [9u8; CHAIN_ID_LEN],
            payload: payload.to_vec(),
        }
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[tokio::test]
    async fn test_attach_over_loopback_tls() -> anyhow::Result<()> {
        harness_telemetry::try_init_for_tests();
        let mut node = LoopbackNode::spawn(LOCAL_ID).await?;
        let handle = handle_for(LOCAL_ID, node.port());

        let (handler, mut inbound) = ChannelHandler::new();
        let session = handle.attach_peer(Arc::new(handler), WAIT).await?;
        let mut accepted = node.next_peer(WAIT).await?;

        assert_eq!(session.id(), node.node_id());
        assert_eq!(handle.node_id(), Some(node.node_id()));
        assert!(timeout(WAIT, session.ready()).await?);
        assert!(timeout(WAIT, accepted.session.ready()).await?);

        // Node to harness.
        assert!(accepted.session.send(gossip(b"from node")));
        let delivered = timeout(WAIT, inbound.recv()).await?.expect("handler open");
        assert_eq!(delivered.op, Op::AppGossip);
        assert_eq!(delivered.message, gossip(b"from node"));
        assert_eq!(delivered.node_id, node.node_id());

        // Harness to node.
        assert!(session.send(gossip(b"from harness")));
        let received = timeout(WAIT, accepted.inbound.recv())
            .await?
            .expect("node handler open");
        assert_eq!(received.message, gossip(b"from harness"));
        assert_eq!(received.node_id, accepted.session.id());

        session.close();
        assert_eq!(timeout(WAIT, session.closed()).await?, CloseReason::Requested);
        Ok(())
    }

    #[tokio::test]
    async fn test_reattach_keeps_node_id() -> anyhow::Result<()> {
        let mut node = LoopbackNode::spawn(LOCAL_ID).await?;
        let handle = handle_for(LOCAL_ID, node.port());
        let ignore: Arc<dyn InboundHandler> = Arc::new(|_msg: InboundMessage| {});

        let first = handle.attach_peer(ignore.clone(), WAIT).await?;
        let _first_peer = node.next_peer(WAIT).await?;
        let second = handle.attach_peer(ignore, WAIT).await?;
        let _second_peer = node.next_peer(WAIT).await?;

        assert_eq!(first.id(), second.id());
        assert_eq!(handle.node_id(), Some(node.node_id()));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_attachments_to_distinct_nodes() -> anyhow::Result<()> {
        let mut nodes = Vec::new();
        for _ in 0..3 {
            nodes.push(LoopbackNode::spawn(LOCAL_ID).await?);
        }
        let handles: Vec<_> = nodes
            .iter()
            .map(|node| Arc::new(handle_for(LOCAL_ID, node.port())))
            .collect();

        let mut tasks = Vec::new();
        for handle in &handles {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let (handler, _inbound) = ChannelHandler::new();
                handle.attach_peer(Arc::new(handler), WAIT).await.map(|s| s.id())
            }));
        }

        for (task, node) in tasks.into_iter().zip(&nodes) {
            assert_eq!(task.await??, node.node_id());
        }
        Ok(())
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[tokio::test]
    async fn test_wrong_network_is_disconnected() -> anyhow::Result<()> {
        let mut node = LoopbackNode::spawn(KOPERNIKUS_ID).await?;
        let handle = handle_for(LOCAL_ID, node.port());

        let (handler, mut inbound) = ChannelHandler::new();
        let session = handle.attach_peer(Arc::new(handler), WAIT).await?;
        let _accepted = node.next_peer(WAIT).await?;

        let reason = timeout(WAIT, session.closed()).await?;
        assert!(
            matches!(
                reason,
                CloseReason::Rejected(_) | CloseReason::PeerClosed | CloseReason::Io(_)
            ),
            "unexpected close reason {:?}",
            reason
        );
        assert!(!session.is_ready());
        assert!(inbound.try_recv().is_err());
        Ok(())
    }

    /// A node side driven by hand: TLS upgrade, one `Version` frame on
    /// `network_id`, then read until the harness hangs up.
    async fn version_then_read_to_eof(
        listener: TcpListener,
        network_id: u32,
    ) -> anyhow::Result<()> {
        let identity = EphemeralIdentity::generate()?;
        let codec = MessageCodec::new(&Registry::new(), "node", DEFAULT_MAX_MESSAGE_SIZE)?;

        let (tcp, _) = listener.accept().await?;
        let mut upgraded = TlsServerUpgrader::new(&identity)?
            .upgrade(Box::new(tcp))
            .await?;

        let my_time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let ip: SocketAddr = "127.0.0.1:9651".parse()?;
        let sig = identity.signer()?.sign(&ip_claim_bytes(&ip, my_time))?;
        let version = Message::Version {
            network_id,
            my_time,
            ip,
            my_version: "camino/1.4.10".to_string(),
            my_version_time: my_time,
            sig,
            tracked_subnets: Vec::new(),
        };
        let body = codec.encode(&version)?;
        codec.write_frame(&mut upgraded.stream, &body).await?;

        let mut buf = [0u8; 1024];
        loop {
            if upgraded.stream.read(&mut buf).await? == 0 {
                return Ok(());
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_handshake_closes_connection() -> anyhow::Result<()> {
        let listener = TcpListener::bind((LOOPBACK, 0)).await?;
        let handle = handle_for(LOCAL_ID, listener.local_addr()?.port());
        let node = tokio::spawn(version_then_read_to_eof(listener, KOPERNIKUS_ID));

        let (handler, _inbound) = ChannelHandler::new();
        let session = handle.attach_peer(Arc::new(handler), WAIT).await?;

        assert_eq!(
            timeout(WAIT, session.closed()).await?,
            CloseReason::Rejected(RejectReason::NetworkMismatch {
                ours: LOCAL_ID,
                theirs: KOPERNIKUS_ID,
            })
        );
        // The session handle is still held; the node must see EOF anyway.
        timeout(WAIT, node).await???;
        assert!(session.is_closed());
        Ok(())
    }

    #[tokio::test]
    async fn test_nothing_listening() -> anyhow::Result<()> {
        let handle = handle_for(LOCAL_ID, closed_port().await?);
        let (handler, _inbound) = ChannelHandler::new();

        let started = tokio::time::Instant::now();
        let result = handle.attach_peer(Arc::new(handler), WAIT).await;
        assert!(matches!(
            result,
            Err(NodeError::Attach(AttachError::Connection(_)))
        ));
        assert!(started.elapsed() < WAIT);
        assert_eq!(handle.node_id(), None);
        Ok(())
    }
}
