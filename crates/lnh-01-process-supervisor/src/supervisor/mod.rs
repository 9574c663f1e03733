//! # OS Process Supervisor
//!
//! `tokio::process` backed [`NodeProcess`].
//!
//! A single reaper task owns the [`Child`]. It is the only place that waits
//! on the child and the only place that signals it, so a termination request
//! can never reach a pid that has already been reaped and possibly reused.
//! The exit outcome is published on a `watch` channel that any number of
//! waiters can observe, before or after the fact.
//!
//! A stop that races a natural exit is not an error. `stop` only reports
//! `AlreadyExited` once some `wait` has returned the exit outcome.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::domain::{ExitOutcome, ProcessConfig, ProcessError, ProcessState};
use crate::ports::NodeProcess;

type StopReply = oneshot::Sender<Result<(), ProcessError>>;

/// Supervises one node binary running as a child process.
pub struct ProcessSupervisor {
    config: ProcessConfig,
    slot: Mutex<Slot>,
}

enum Slot {
    Unstarted,
    Started(Running),
}

struct Running {
    pid: Option<u32>,
    stop_tx: mpsc::UnboundedSender<StopReply>,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
    /// Set once a `wait` has returned the exit outcome.
    observed: Arc<AtomicBool>,
}

impl ProcessSupervisor {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(Slot::Unstarted),
        }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// OS process id, once started.
    pub fn pid(&self) -> Option<u32> {
        match &*self.slot.lock() {
            Slot::Unstarted => None,
            Slot::Started(running) => running.pid,
        }
    }

    fn spawn_child(&self) -> Result<Child, ProcessError> {
        let mut command = Command::new(&self.config.binary_path);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(std::process::Stdio::null())
            .stdout(self.config.stdout())
            .stderr(self.config.stderr());

        command.spawn().map_err(|source| ProcessError::Spawn {
            path: self.config.binary_path.clone(),
            source,
        })
    }
}

#[async_trait]
impl NodeProcess for ProcessSupervisor {
    async fn start(&self) -> Result<(), ProcessError> {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Started(_)) {
            return Err(ProcessError::AlreadyStarted);
        }

        let child = self.spawn_child()?;
        let pid = child.id();
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);

        info!(
            binary = %self.config.binary_path.display(),
            pid = ?pid,
            "node process started"
        );
        tokio::spawn(reap(child, pid, stop_rx, exit_tx));

        *slot = Slot::Started(Running {
            pid,
            stop_tx,
            exit_rx,
            observed: Arc::new(AtomicBool::new(false)),
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ProcessError> {
        let (stop_tx, observed) = match &*self.slot.lock() {
            Slot::Unstarted => return Err(ProcessError::NotStarted),
            Slot::Started(running) => (running.stop_tx.clone(), running.observed.clone()),
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if stop_tx.send(reply_tx).is_err() {
            return exited(&observed);
        }
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => exited(&observed),
        }
    }

    async fn wait(&self) -> Result<(), ProcessError> {
        let (mut exit_rx, observed) = match &*self.slot.lock() {
            Slot::Unstarted => return Err(ProcessError::NotStarted),
            Slot::Started(running) => (running.exit_rx.clone(), running.observed.clone()),
        };

        let outcome = exit_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ProcessError::Wait("supervisor task ended without an exit status".into()))?
            .clone();

        match outcome {
            Some(outcome) => {
                observed.store(true, Ordering::SeqCst);
                outcome.into_result()
            }
            None => Err(ProcessError::Wait("missing exit status".into())),
        }
    }

    fn state(&self) -> ProcessState {
        match &*self.slot.lock() {
            Slot::Unstarted => ProcessState::Unstarted,
            Slot::Started(running) => match running.exit_rx.borrow().clone() {
                Some(outcome) => ProcessState::Exited(outcome),
                None => ProcessState::Running,
            },
        }
    }
}

/// Owns the child until it exits, serving termination requests meanwhile.
async fn reap(
    mut child: Child,
    pid: Option<u32>,
    mut stop_rx: mpsc::UnboundedReceiver<StopReply>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(reply) = stop_rx.recv() => {
                let result = match child.id() {
                    Some(pid) => terminate(pid),
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
        }
    };

    let outcome = match status {
        Ok(status) => ExitOutcome::from(status),
        Err(e) => ExitOutcome::Unknown(e.to_string()),
    };

    // Requests already queued raced with the exit and count as delivered.
    stop_rx.close();
    while let Ok(reply) = stop_rx.try_recv() {
        let _ = reply.send(Ok(()));
    }

    if outcome.is_success() {
        info!(pid = ?pid, "node process exited");
    } else {
        warn!(pid = ?pid, outcome = ?outcome, "node process exited abnormally");
    }
    exit_tx.send_replace(Some(outcome));
}

/// Answer to a stop request that arrived after the reaper finished.
fn exited(observed: &AtomicBool) -> Result<(), ProcessError> {
    if observed.load(Ordering::SeqCst) {
        Err(ProcessError::AlreadyExited)
    } else {
        Ok(())
    }
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<(), ProcessError> {
    debug!(pid, "sending SIGTERM");
    // SAFETY: plain syscall on a pid owned by this reaper and not yet reaped.
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // Already gone; the reaper will observe the exit.
        return Ok(());
    }
    Err(ProcessError::Signal { pid, source: err })
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<(), ProcessError> {
    Err(ProcessError::Signal {
        pid,
        source: io::Error::new(
            io::ErrorKind::Unsupported,
            "graceful termination requires a unix platform",
        ),
    })
}
