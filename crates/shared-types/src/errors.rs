//! # Error Types
//!
//! Errors raised while parsing shared identifiers.

use thiserror::Error;

/// Errors produced when decoding an identifier from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    /// The `NodeID-` prefix is missing.
    #[error("missing prefix: expected {expected:?}")]
    MissingPrefix { expected: &'static str },

    /// The body is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded body has the wrong length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
