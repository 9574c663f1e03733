//! # Domain Layer
//!
//! Identities, versions, messages and validator sets. Nothing here performs
//! network I/O.

pub mod identity;
pub mod message;
pub mod validators;
pub mod version;

pub use identity::{verify_signature, EphemeralIdentity, IdentityError, IdentitySigner};
pub use message::{ip_claim_bytes, ClaimedIpPort, InboundMessage, Message, Op, CHAIN_ID_LEN};
pub use validators::ValidatorSet;
pub use version::{
    current_version, ApplicationVersion, DefaultVersionParser, VersionCompatibility,
    VersionError, VersionParser, APP_NAME,
};
