//! # Ports
//!
//! Outbound capabilities of a node handle: reaching the node's peer port
//! and its HTTP APIs.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use lnh_02_peer_attacher::BoxedStream;

/// Where a node accepts peer connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerEndpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl PeerEndpoint {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.socket_addr(), f)
    }
}

/// Opens raw connections to a node's peer port.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, endpoint: PeerEndpoint) -> io::Result<BoxedStream>;
}

/// Client for a node's HTTP APIs.
///
/// Requests themselves are issued by API-specific clients built on top of
/// this boundary.
pub trait ApiClient: Send + Sync + fmt::Debug {
    /// Base URI, e.g. `http://127.0.0.1:9650`.
    fn base_uri(&self) -> &str;

    /// Full URI of an API path such as `/ext/info`.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_uri().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// [`ApiClient`] addressing a node over plain HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpApiClient {
    base_uri: String,
}

impl HttpApiClient {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            base_uri: format!("http://{}", SocketAddr::new(ip, port)),
        }
    }
}

impl ApiClient for HttpApiClient {
    fn base_uri(&self) -> &str {
        &self.base_uri
    }
}
