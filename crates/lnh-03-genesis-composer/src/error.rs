use thiserror::Error;

/// Genesis composition errors.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// A document or embedded document is not valid JSON.
    #[error("failed to decode {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A field is missing or has the wrong JSON type.
    #[error("expected {field} to be {expected}, found {found}")]
    ConfigShape {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// Re-encoding the composed document failed.
    #[error("failed to encode {context}: {source}")]
    Encode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// `NETWORK_ID` holds neither a number nor a known network name.
    #[error("invalid network id {0:?}")]
    InvalidNetworkId(String),
}
