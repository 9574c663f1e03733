//! # Local Network Harness Test Suite
//!
//! Cross-crate integration tests. Unit tests live next to the code in each
//! crate; everything here exercises real processes, real loopback sockets
//! and real TLS.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs          # Loopback node, script helpers
//! └── integration/
//!     ├── process_lifecycle.rs
//!     ├── peer_attachment.rs
//!     └── genesis.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lnh-tests
//! cargo test -p lnh-tests integration::peer_attachment::
//! LNH_LOG_LEVEL=debug cargo test -p lnh-tests -- --nocapture
//! ```

pub mod fixtures;
pub mod integration;
