//! Settings specific to nodes running as local processes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use lnh_01_process_supervisor::ProcessConfig;
use serde::{Deserialize, Serialize};

/// How to run one local node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNodeConfig {
    /// Node binary to execute.
    pub binary_path: PathBuf,
    /// Forward the node's stdout to ours.
    #[serde(default)]
    pub redirect_stdout: bool,
    /// Forward the node's stderr to ours.
    #[serde(default)]
    pub redirect_stderr: bool,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl LocalNodeConfig {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            ..Default::default()
        }
    }

    pub fn process_config(&self) -> ProcessConfig {
        ProcessConfig {
            binary_path: self.binary_path.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            redirect_stdout: self.redirect_stdout,
            redirect_stderr: self.redirect_stderr,
        }
    }
}

impl From<LocalNodeConfig> for ProcessConfig {
    fn from(config: LocalNodeConfig) -> Self {
        ProcessConfig {
            binary_path: config.binary_path,
            args: config.args,
            env: config.env,
            redirect_stdout: config.redirect_stdout,
            redirect_stderr: config.redirect_stderr,
        }
    }
}
