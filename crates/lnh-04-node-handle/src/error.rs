use lnh_01_process_supervisor::ProcessError;
use lnh_02_peer_attacher::AttachError;
use shared_types::NodeId;
use thiserror::Error;

/// Node handle errors.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The handle already carries a different node identity.
    #[error("node id already set to {current}, refusing {attempted}")]
    NodeIdConflict { current: NodeId, attempted: NodeId },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("attaching peer failed: {0}")]
    Attach(#[from] AttachError),
}
