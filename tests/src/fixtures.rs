//! Shared fixtures for integration tests.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use lnh_02_peer_attacher::test_utils::{AcceptedPeer, FakeNode};
use lnh_04_node_handle::LOOPBACK;
use shared_types::NodeId;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Script body that runs until SIGTERM, then exits cleanly.
pub const GRACEFUL_NODE: &str = "trap 'exit 0' TERM\nwhile :; do sleep 1; done";

/// A peer port on the loopback interface served by an in-process node.
///
/// Every accepted TCP connection is upgraded to TLS as the server side and
/// runs a regular peer session.
pub struct LoopbackNode {
    port: u16,
    node_id: NodeId,
    accepted: mpsc::UnboundedReceiver<AcceptedPeer>,
    task: JoinHandle<()>,
}

impl LoopbackNode {
    pub async fn spawn(network_id: u32) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((LOOPBACK, 0)).await?;
        let port = listener.local_addr()?.port();
        let node = FakeNode::new(network_id)?;
        let node_id = node.node_id();
        let (tx, accepted) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, remote)) = listener.accept().await {
                match node.accept(Box::new(stream)).await {
                    Ok(peer) => {
                        if tx.send(peer).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(%remote, error = %e, "loopback node refused peer"),
                }
            }
        });

        Ok(Self {
            port,
            node_id,
            accepted,
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Next peer that completed the TLS upgrade.
    pub async fn next_peer(&mut self, timeout: Duration) -> anyhow::Result<AcceptedPeer> {
        tokio::time::timeout(timeout, self.accepted.recv())
            .await
            .context("no peer accepted in time")?
            .ok_or_else(|| anyhow!("loopback node stopped"))
    }
}

impl Drop for LoopbackNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A port nothing listens on.
pub async fn closed_port() -> io::Result<u16> {
    let listener = TcpListener::bind((LOOPBACK, 0)).await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Write an executable `/bin/sh` script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}
