//! # Process Supervisor
//!
//! Owns the OS-level lifecycle of one node binary: start, graceful stop and
//! wait-for-exit.
//!
//! ## Architecture
//!
//! - **Domain Layer:** lifecycle states, exit outcomes, configuration, errors
//! - **Ports Layer:** the [`NodeProcess`] capability trait
//! - **Supervisor:** [`ProcessSupervisor`], the `tokio::process` backed
//!   implementation
//! - **Test utilities:** [`MockProcess`] (feature `test-utils`)
//!
//! ## Lifecycle
//!
//! ```text
//! Unstarted ──start()──→ Running ──stop()/natural exit──→ Exited
//! ```
//!
//! `start` is not idempotent. `stop` sends SIGTERM, never SIGKILL, and may
//! race with `wait` and with the process exiting on its own.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lnh_01_process_supervisor::{NodeProcess, ProcessConfig, ProcessSupervisor};
//!
//! let process = ProcessSupervisor::new(ProcessConfig::new("/usr/local/bin/node"));
//! process.start().await?;
//! process.stop().await?;
//! process.wait().await?;
//! ```

pub mod domain;
pub mod ports;
pub mod supervisor;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use domain::{ExitOutcome, ProcessConfig, ProcessError, ProcessState};
pub use ports::NodeProcess;
pub use supervisor::ProcessSupervisor;

#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::{MockBehavior, MockProcess};
