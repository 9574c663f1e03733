//! # Node Handle
//!
//! Harness-side handle to one locally running node.
//!
//! A [`NodeHandle`] owns the node's [`NodeProcess`](lnh_01_process_supervisor::NodeProcess),
//! knows its ports and network, and can attach an instrumentation peer to
//! it through the [`PeerAttacher`](lnh_02_peer_attacher::PeerAttacher).
//!
//! ```ignore
//! let node = NodeHandle::from_config("node-1", LOCAL_ID, 9650, 9651, config);
//! node.start().await?;
//! let session = node.attach_peer(Arc::new(handler), Duration::from_secs(10)).await?;
//! ```

pub mod config;
pub mod dialer;
pub mod error;
pub mod handle;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::LocalNodeConfig;
pub use dialer::LoopbackDialer;
pub use error::NodeError;
pub use handle::{NodeHandle, LOOPBACK};
pub use ports::{ApiClient, ConnectionFactory, HttpApiClient, PeerEndpoint};

#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::MockConnectionFactory;
