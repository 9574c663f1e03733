use std::process::ExitStatus;

use crate::domain::ProcessError;

/// Lifecycle state of a supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Unstarted,
    Running,
    Exited(ExitOutcome),
}

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exit status 0.
    Success,
    /// Non-zero exit status.
    Code(i32),
    /// Killed by a signal.
    Signal(i32),
    /// The status could not be collected.
    Unknown(String),
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }

    /// The error `wait` reports for this outcome, if any.
    pub fn into_result(self) -> Result<(), ProcessError> {
        match self {
            ExitOutcome::Success => Ok(()),
            ExitOutcome::Code(code) => Err(ProcessError::Exited { code }),
            ExitOutcome::Signal(signal) => Err(ProcessError::Terminated { signal }),
            ExitOutcome::Unknown(reason) => Err(ProcessError::Wait(reason)),
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => ExitOutcome::Success,
            Some(code) => ExitOutcome::Code(code),
            None => signal_of(&status)
                .map(ExitOutcome::Signal)
                .unwrap_or_else(|| ExitOutcome::Unknown(status.to_string())),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}
