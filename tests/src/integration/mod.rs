//! # Integration Flows
//!
//! - `process_lifecycle`: node handles driving real child processes
//! - `peer_attachment`: attaching to a node over loopback TCP and TLS
//! - `genesis`: network selection through to the composed document

pub mod genesis;
pub mod peer_attachment;
pub mod process_lifecycle;
