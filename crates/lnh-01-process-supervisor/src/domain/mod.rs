//! # Domain Layer
//!
//! Pure lifecycle types. No I/O happens here.

pub mod config;
pub mod error;
pub mod state;

pub use config::ProcessConfig;
pub use error::ProcessError;
pub use state::{ExitOutcome, ProcessState};
