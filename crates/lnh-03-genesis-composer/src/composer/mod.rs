//! # Genesis Composer
//!
//! Produces the genesis document for a new local network: the network's
//! embedded base document with the EVM subchain configuration replaced by
//! [`CanonicalChainConfig`].
//!
//! The subchain genesis travels as a JSON-encoded string inside the outer
//! document, so composition decodes it, swaps its `config`, and writes it
//! back as a string.

use serde_json::Value;
use shared_types::network_name;
use tracing::debug;

use crate::canonical::CanonicalChainConfig;
use crate::documents::NetworkSelector;
use crate::error::GenesisError;

/// Field holding the encoded subchain genesis.
pub const C_CHAIN_GENESIS_FIELD: &str = "cChainGenesis";

/// Field of the subchain genesis replaced by the canonical configuration.
pub const CONFIG_FIELD: &str = "config";

/// Composes genesis documents for one network.
#[derive(Debug, Clone)]
pub struct GenesisComposer {
    network_id: u32,
    canonical: CanonicalChainConfig,
}

impl GenesisComposer {
    pub fn new(network_id: u32) -> Self {
        Self {
            network_id,
            canonical: CanonicalChainConfig::local(),
        }
    }

    /// Replace the subchain configuration written into documents.
    pub fn with_canonical(mut self, canonical: CanonicalChainConfig) -> Self {
        self.canonical = canonical;
        self
    }

    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    pub fn selector(&self) -> NetworkSelector {
        NetworkSelector::from_network_id(self.network_id)
    }

    /// Compose the genesis document for this composer's network.
    pub fn compose(&self) -> Result<Value, GenesisError> {
        let selector = self.selector();
        debug!(
            network_id = self.network_id,
            network = %network_name(self.network_id),
            ?selector,
            "composing genesis"
        );
        compose_document(selector.document(), &self.canonical)
    }
}

/// Compose `raw` with `canonical` as its subchain configuration.
///
/// Pure: the same inputs always produce the same document.
pub fn compose_document(
    raw: &str,
    canonical: &CanonicalChainConfig,
) -> Result<Value, GenesisError> {
    let mut genesis: Value =
        serde_json::from_str(raw).map_err(|source| GenesisError::Decode {
            context: "genesis document",
            source,
        })?;

    let found = json_type(&genesis);
    let outer = genesis
        .as_object_mut()
        .ok_or(GenesisError::ConfigShape {
            field: "genesis document",
            expected: "an object",
            found,
        })?;

    let encoded = match outer.get(C_CHAIN_GENESIS_FIELD) {
        Some(Value::String(encoded)) => encoded,
        Some(other) => {
            return Err(GenesisError::ConfigShape {
                field: C_CHAIN_GENESIS_FIELD,
                expected: "a string",
                found: json_type(other),
            })
        }
        None => {
            return Err(GenesisError::ConfigShape {
                field: C_CHAIN_GENESIS_FIELD,
                expected: "a string",
                found: "nothing",
            })
        }
    };

    let mut c_chain: Value =
        serde_json::from_str(encoded).map_err(|source| GenesisError::Decode {
            context: C_CHAIN_GENESIS_FIELD,
            source,
        })?;
    let found = json_type(&c_chain);
    let c_chain_fields = c_chain
        .as_object_mut()
        .ok_or(GenesisError::ConfigShape {
            field: C_CHAIN_GENESIS_FIELD,
            expected: "an encoded object",
            found,
        })?;

    let config = serde_json::to_value(canonical).map_err(|source| GenesisError::Encode {
        context: "canonical chain config",
        source,
    })?;
    c_chain_fields.insert(CONFIG_FIELD.to_string(), config);

    let reencoded = serde_json::to_string(&c_chain).map_err(|source| GenesisError::Encode {
        context: C_CHAIN_GENESIS_FIELD,
        source,
    })?;
    outer.insert(C_CHAIN_GENESIS_FIELD.to_string(), Value::String(reencoded));

    Ok(genesis)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
