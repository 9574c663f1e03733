//! # Canonical Subchain Configuration
//!
//! The chain configuration compiled into the node's EVM subchain for local
//! networks. Every composed genesis carries exactly this value as the
//! `config` of its `cChainGenesis`.

use serde::{Deserialize, Serialize};

/// Chain ID of the EVM subchain on local networks.
pub const LOCAL_CHAIN_ID: u64 = 43112;

/// Hash pinned for the EIP-150 fork block.
pub const EIP150_HASH: &str =
    "0x2086799aeebeae135c246c65021c82b4e15a2c451340993aacfd2751886514f0";

/// EVM subchain configuration, serialized with the field names the node
/// expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalChainConfig {
    pub chain_id: u64,
    pub homestead_block: u64,
    pub dao_fork_block: u64,
    pub dao_fork_support: bool,
    pub eip150_block: u64,
    pub eip150_hash: String,
    pub eip155_block: u64,
    pub eip158_block: u64,
    pub byzantium_block: u64,
    pub constantinople_block: u64,
    pub petersburg_block: u64,
    pub istanbul_block: u64,
    pub muir_glacier_block: u64,
    pub apricot_phase1_block_timestamp: u64,
    pub apricot_phase2_block_timestamp: u64,
    pub apricot_phase3_block_timestamp: u64,
    pub apricot_phase4_block_timestamp: u64,
    pub apricot_phase5_block_timestamp: u64,
    pub sunrise_phase0_block_timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub banff_block_timestamp: Option<u64>,
}

impl CanonicalChainConfig {
    /// Configuration for local networks: every fork active from genesis.
    pub fn local() -> Self {
        Self {
            chain_id: LOCAL_CHAIN_ID,
            homestead_block: 0,
            dao_fork_block: 0,
            dao_fork_support: true,
            eip150_block: 0,
            eip150_hash: EIP150_HASH.to_string(),
            eip155_block: 0,
            eip158_block: 0,
            byzantium_block: 0,
            constantinople_block: 0,
            petersburg_block: 0,
            istanbul_block: 0,
            muir_glacier_block: 0,
            apricot_phase1_block_timestamp: 0,
            apricot_phase2_block_timestamp: 0,
            apricot_phase3_block_timestamp: 0,
            apricot_phase4_block_timestamp: 0,
            apricot_phase5_block_timestamp: 0,
            sunrise_phase0_block_timestamp: 0,
            banff_block_timestamp: Some(0),
        }
    }
}

impl Default for CanonicalChainConfig {
    fn default() -> Self {
        Self::local()
    }
}
