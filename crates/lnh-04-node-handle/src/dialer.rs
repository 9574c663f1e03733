use std::io;

use async_trait::async_trait;
use lnh_02_peer_attacher::BoxedStream;
use tracing::debug;
use tokio::net::TcpStream;

use crate::ports::{ConnectionFactory, PeerEndpoint};

/// Default [`ConnectionFactory`]: a plain TCP dial.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackDialer;

#[async_trait]
impl ConnectionFactory for LoopbackDialer {
    async fn connect(&self, endpoint: PeerEndpoint) -> io::Result<BoxedStream> {
        let stream = TcpStream::connect(endpoint.socket_addr()).await?;
        stream.set_nodelay(true)?;
        debug!(%endpoint, "dialed peer port");
        Ok(Box::new(stream))
    }
}
