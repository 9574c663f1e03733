//! # Process Lifecycle
//!
//! Node handles backed by real `/bin/sh` processes.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use lnh_01_process_supervisor::{ProcessError, ProcessState};
    use lnh_04_node_handle::{LocalNodeConfig, NodeError, NodeHandle};
    use shared_types::LOCAL_ID;
    use tempfile::TempDir;
    use tokio::time::timeout;

    use crate::fixtures::{write_script, GRACEFUL_NODE};

    const WAIT: Duration = Duration::from_secs(10);

    fn handle(name: &str, config: LocalNodeConfig) -> NodeHandle {
        NodeHandle::from_config(name, LOCAL_ID, 9650, 9651, config)
    }

    // =========================================================================
    // Start / stop / wait
    // =========================================================================

    #[tokio::test]
    async fn test_graceful_stop() -> anyhow::Result<()> {
        harness_telemetry::try_init_for_tests();
        let dir = TempDir::new()?;
        let script = write_script(dir.path(), "node.sh", GRACEFUL_NODE)?;
        let node = handle("graceful", LocalNodeConfig::new(script));

        node.start().await?;
        assert_eq!(node.state(), ProcessState::Running);
        // Let the shell install its trap.
        tokio::time::sleep(Duration::from_millis(300)).await;

        node.stop().await?;
        timeout(WAIT, node.wait()).await??;
        assert!(matches!(node.state(), ProcessState::Exited(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_args_and_env_reach_the_process() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let output = dir.path().join("out.txt");
        let script = write_script(
            dir.path(),
            "node.sh",
            "echo \"$1:$NODE_FLAVOR\" > \"$2\"",
        )?;

        let mut config = LocalNodeConfig::new(script);
        config.args = vec!["hello".into(), output.display().to_string()];
        config.env.insert("NODE_FLAVOR".into(), "camino".into());
        let node = handle("args", config);

        node.start().await?;
        timeout(WAIT, node.wait()).await??;
        assert_eq!(fs::read_to_string(&output)?.trim(), "hello:camino");
        Ok(())
    }

    #[tokio::test]
    async fn test_non_zero_exit_reported() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let script = write_script(dir.path(), "node.sh", "exit 7")?;
        let node = handle("crash", LocalNodeConfig::new(script));

        node.start().await?;
        let result = timeout(WAIT, node.wait()).await?;
        assert!(matches!(
            result,
            Err(NodeError::Process(ProcessError::Exited { code: 7 }))
        ));
        assert!(matches!(
            node.stop().await,
            Err(NodeError::Process(ProcessError::AlreadyExited))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let node = handle(
            "missing",
            LocalNodeConfig::new("/nonexistent/camino-node"),
        );

        assert!(matches!(
            node.start().await,
            Err(NodeError::Process(ProcessError::Spawn { .. }))
        ));
        assert_eq!(node.state(), ProcessState::Unstarted);
        assert!(matches!(
            node.wait().await,
            Err(NodeError::Process(ProcessError::NotStarted))
        ));
    }

    #[tokio::test]
    async fn test_stop_and_wait_race_across_nodes() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let script = write_script(dir.path(), "node.sh", GRACEFUL_NODE)?;

        let mut nodes = Vec::new();
        for i in 0..4 {
            let node = handle(&format!("node-{}", i), LocalNodeConfig::new(&script));
            node.start().await?;
            nodes.push(node);
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        for node in &nodes {
            let (stopped, waited) = tokio::join!(node.stop(), timeout(WAIT, node.wait()));
            stopped?;
            waited??;
        }
        Ok(())
    }
}
