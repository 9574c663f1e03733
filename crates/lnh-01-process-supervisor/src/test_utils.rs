//! # Test Utilities
//!
//! [`MockProcess`] implements [`NodeProcess`] without touching the OS, so
//! callers can simulate crashes, failed launches and stubborn processes.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::{ExitOutcome, ProcessError, ProcessState};
use crate::ports::NodeProcess;

/// Scripted behaviour of a [`MockProcess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Runs until stopped, then exits cleanly.
    ExitOnStop,
    /// Exits with the given code as soon as it starts.
    Crash { code: i32 },
    /// `start` fails as if the binary were missing.
    SpawnFailure,
    /// Ignores `stop`; only [`MockProcess::finish`] ends it.
    IgnoreStop,
}

/// In-memory [`NodeProcess`] double.
pub struct MockProcess {
    behavior: MockBehavior,
    started: Mutex<bool>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    observed: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl MockProcess {
    pub fn new(behavior: MockBehavior) -> Self {
        let (exit_tx, _) = watch::channel(None);
        Self {
            behavior,
            started: Mutex::new(false),
            exit_tx,
            observed: AtomicBool::new(false),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    /// Force the process to exit with `outcome`.
    pub fn finish(&self, outcome: ExitOutcome) {
        self.exit_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        });
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    fn has_exited(&self) -> bool {
        self.exit_tx.borrow().is_some()
    }
}

impl Default for MockProcess {
    fn default() -> Self {
        Self::new(MockBehavior::ExitOnStop)
    }
}

#[async_trait]
impl NodeProcess for MockProcess {
    async fn start(&self) -> Result<(), ProcessError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let mut started = self.started.lock();
        if *started {
            return Err(ProcessError::AlreadyStarted);
        }
        if self.behavior == MockBehavior::SpawnFailure {
            return Err(ProcessError::Spawn {
                path: PathBuf::from("mock-node"),
                source: io::Error::new(io::ErrorKind::NotFound, "mock spawn failure"),
            });
        }
        *started = true;
        drop(started);

        if let MockBehavior::Crash { code } = self.behavior {
            self.finish(ExitOutcome::Code(code));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ProcessError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if !*self.started.lock() {
            return Err(ProcessError::NotStarted);
        }
        if self.observed.load(Ordering::SeqCst) {
            return Err(ProcessError::AlreadyExited);
        }
        if self.has_exited() {
            return Ok(());
        }
        if self.behavior == MockBehavior::ExitOnStop {
            self.finish(ExitOutcome::Success);
        }
        Ok(())
    }

    async fn wait(&self) -> Result<(), ProcessError> {
        if !*self.started.lock() {
            return Err(ProcessError::NotStarted);
        }
        let mut exit_rx = self.exit_tx.subscribe();
        let outcome = exit_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ProcessError::Wait("mock dropped".into()))?
            .clone();
        match outcome {
            Some(outcome) => {
                self.observed.store(true, Ordering::SeqCst);
                outcome.into_result()
            }
            None => Err(ProcessError::Wait("missing exit status".into())),
        }
    }

    fn state(&self) -> ProcessState {
        if !*self.started.lock() {
            return ProcessState::Unstarted;
        }
        match self.exit_tx.borrow().clone() {
            Some(outcome) => ProcessState::Exited(outcome),
            None => ProcessState::Running,
        }
    }
}
