//! # Identifiers
//!
//! - `NodeId`: 20-byte identity derived from a node's staking certificate
//! - `SubnetId`: 32-byte subnet identifier

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::IdParseError;

/// Length of a [`NodeId`] in bytes.
pub const NODE_ID_LEN: usize = 20;

/// Text prefix used when printing node identifiers.
pub const NODE_ID_PREFIX: &str = "NodeID-";

/// Identity of a node, derived from the DER encoding of its certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl NodeId {
    /// The all-zero identifier.
    pub const EMPTY: NodeId = NodeId([0u8; NODE_ID_LEN]);

    /// Derive the identifier of the holder of `cert_der`.
    ///
    /// The identifier is the leading 20 bytes of the SHA-256 digest of the
    /// DER-encoded certificate, so the same certificate always yields the
    /// same identifier.
    pub fn from_cert(cert_der: &[u8]) -> Self {
        let digest = Sha256::digest(cert_der);
        let mut id = [0u8; NODE_ID_LEN];
        id.copy_from_slice(&digest[..NODE_ID_LEN]);
        NodeId(id)
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NODE_ID_PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl FromStr for NodeId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(NODE_ID_PREFIX)
            .ok_or(IdParseError::MissingPrefix {
                expected: NODE_ID_PREFIX,
            })?;
        let bytes = hex::decode(body).map_err(|e| IdParseError::InvalidHex(e.to_string()))?;
        let id: [u8; NODE_ID_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| IdParseError::InvalidLength {
                    expected: NODE_ID_LEN,
                    actual: bytes.len(),
                })?;
        Ok(NodeId(id))
    }
}

/// Identifier of a subnet a node may track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct SubnetId(pub [u8; 32]);

impl fmt::Display for SubnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
