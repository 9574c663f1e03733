//! # Base Documents
//!
//! Network-specific genesis documents embedded at compile time.

use serde::{Deserialize, Serialize};
use shared_types::KOPERNIKUS_ID;

const DEFAULT_GENESIS: &str = include_str!("../genesis/default.json");
const KOPERNIKUS_GENESIS: &str = include_str!("../genesis/kopernikus.json");

/// Which embedded base document a network starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkSelector {
    Default,
    Kopernikus,
}

impl NetworkSelector {
    /// Kopernikus has its own base document; every other network uses the
    /// default one.
    pub fn from_network_id(network_id: u32) -> Self {
        if network_id == KOPERNIKUS_ID {
            NetworkSelector::Kopernikus
        } else {
            NetworkSelector::Default
        }
    }

    /// Raw JSON text of the base document.
    pub fn document(&self) -> &'static str {
        match self {
            NetworkSelector::Default => DEFAULT_GENESIS,
            NetworkSelector::Kopernikus => KOPERNIKUS_GENESIS,
        }
    }
}
