use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Process lifecycle errors.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// `start` was called on a process that was already started.
    #[error("process already started")]
    AlreadyStarted,

    /// `stop` or `wait` was called before a successful `start`.
    #[error("process not started")]
    NotStarted,

    /// `stop` was called after the exit had already been observed.
    #[error("process already exited")]
    AlreadyExited,

    /// The binary could not be launched.
    #[error("failed to spawn {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The termination signal could not be delivered.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// The process exited with a non-zero status.
    #[error("process exited with code {code}")]
    Exited { code: i32 },

    /// The process was killed by a signal.
    #[error("process terminated by signal {signal}")]
    Terminated { signal: i32 },

    /// The exit status could not be collected.
    #[error("failed to wait for process: {0}")]
    Wait(String),
}
