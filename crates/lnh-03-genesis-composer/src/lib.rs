//! # Genesis Composer
//!
//! Builds genesis documents for local test networks from an embedded,
//! network-specific base document and the canonical EVM subchain
//! configuration.
//!
//! ```ignore
//! let network_id = GenesisConfig::from_env()?.network_id;
//! let genesis = GenesisComposer::new(network_id).compose()?;
//! ```

pub mod canonical;
pub mod composer;
pub mod config;
pub mod documents;
pub mod error;

pub use canonical::{CanonicalChainConfig, LOCAL_CHAIN_ID};
pub use composer::{compose_document, GenesisComposer, C_CHAIN_GENESIS_FIELD, CONFIG_FIELD};
pub use config::{GenesisConfig, NETWORK_ID_ENV};
pub use documents::NetworkSelector;
pub use error::GenesisError;
