//! # Harness Telemetry
//!
//! Logging bootstrap shared by harness binaries and integration tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harness_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config).expect("logging already initialized");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LNH_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `LNH_JSON_LOGS` | `false` | Emit JSON lines instead of text |
//! | `LNH_CONSOLE_OUTPUT` | `true` | Write logs to stderr at all |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, try_init_for_tests};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to install global subscriber: {0}")]
    Init(String),
}
