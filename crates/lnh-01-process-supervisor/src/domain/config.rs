//! Process invocation settings.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Serialize};

/// How to launch one node binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConfig {
    /// Path of the binary to execute.
    pub binary_path: PathBuf,
    /// Command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables, layered over the harness environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Forward the child's stdout to the harness stdout (otherwise discarded).
    #[serde(default)]
    pub redirect_stdout: bool,
    /// Forward the child's stderr to the harness stderr (otherwise discarded).
    #[serde(default)]
    pub redirect_stderr: bool,
}

impl ProcessConfig {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            ..Default::default()
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_redirects(mut self, stdout: bool, stderr: bool) -> Self {
        self.redirect_stdout = stdout;
        self.redirect_stderr = stderr;
        self
    }

    pub(crate) fn stdout(&self) -> Stdio {
        redirect(self.redirect_stdout)
    }

    pub(crate) fn stderr(&self) -> Stdio {
        redirect(self.redirect_stderr)
    }
}

fn redirect(enabled: bool) -> Stdio {
    if enabled {
        Stdio::inherit()
    } else {
        Stdio::null()
    }
}
