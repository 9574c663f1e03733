//! # Driving Port
//!
//! The capability every supervised node process exposes. Kept as a trait so
//! tests can substitute crashing or hanging doubles without spawning
//! anything.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ProcessError, ProcessState};

/// A node binary whose lifecycle can be driven by the harness.
///
/// # Thread Safety
///
/// All methods take `&self`; `stop` and `wait` may be called concurrently
/// from different tasks. `start` must not be called concurrently with
/// itself.
#[async_trait]
pub trait NodeProcess: Send + Sync {
    /// Launch the process.
    ///
    /// Fails with [`ProcessError::AlreadyStarted`] on a second call.
    async fn start(&self) -> Result<(), ProcessError>;

    /// Ask the running process to terminate gracefully (SIGTERM).
    async fn stop(&self) -> Result<(), ProcessError>;

    /// Resolve once the process has exited.
    ///
    /// `Ok(())` only for a clean (status 0) exit.
    async fn wait(&self) -> Result<(), ProcessError>;

    /// Current lifecycle state.
    fn state(&self) -> ProcessState;
}

/// Shared processes drive the same underlying lifecycle.
#[async_trait]
impl<T> NodeProcess for Arc<T>
where
    T: NodeProcess + ?Sized,
{
    async fn start(&self) -> Result<(), ProcessError> {
        (**self).start().await
    }

    async fn stop(&self) -> Result<(), ProcessError> {
        (**self).stop().await
    }

    async fn wait(&self) -> Result<(), ProcessError> {
        (**self).wait().await
    }

    fn state(&self) -> ProcessState {
        (**self).state()
    }
}
