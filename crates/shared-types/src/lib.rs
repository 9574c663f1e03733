//! # Shared Types Crate
//!
//! Identifiers used by every harness subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `NodeId`, `SubnetId` and the well-known
//!   network identifiers are defined once and re-exported here.
//! - **Derived Identity**: a `NodeId` is always derived from a staking
//!   certificate, never chosen.

pub mod entities;
pub mod errors;
pub mod network;

pub use entities::*;
pub use errors::*;
pub use network::*;
