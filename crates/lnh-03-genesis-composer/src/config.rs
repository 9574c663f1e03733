//! Outer-layer configuration: which network to compose genesis for.

use serde::{Deserialize, Serialize};
use shared_types::{parse_network_id, LOCAL_ID};

use crate::error::GenesisError;

/// Environment variable naming the target network.
pub const NETWORK_ID_ENV: &str = "NETWORK_ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisConfig {
    pub network_id: u32,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            network_id: LOCAL_ID,
        }
    }
}

impl GenesisConfig {
    /// Read `NETWORK_ID` from the process environment. Unset or empty means
    /// the local network.
    pub fn from_env() -> Result<Self, GenesisError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`GenesisConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GenesisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(NETWORK_ID_ENV) {
            Some(value) if !value.trim().is_empty() => parse_network_id(&value)
                .map(|network_id| Self { network_id })
                .ok_or(GenesisError::InvalidNetworkId(value)),
            _ => Ok(Self::default()),
        }
    }
}
