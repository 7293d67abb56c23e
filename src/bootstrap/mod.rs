//! Infrastructure bootstrap engine
//!
//! Fans a host list out concurrently through a command executor and
//! a network provider, and collects per-host outcomes into a result
//! ordered by the input list, not by completion. One host's failure
//! never stops the others; a failure of the bootstrap service itself
//! aborts with no result.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::domain::hostplan::Host;
use crate::error::BootstrapError;
use crate::exec::CommandExecutor;
use crate::providers::NetworkProvider;

/// Bootstrap settings drawn from the environment's infra block.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub ssh_user: String,
}

/// Outcome for one host, echoing the host it belongs to.
#[derive(Debug, Clone)]
pub struct HostOutcome {
    pub host: Host,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-host outcomes in input order.
#[derive(Debug, Clone, Default)]
pub struct BootstrapResult {
    pub hosts: Vec<HostOutcome>,
}

impl BootstrapResult {
    pub fn all_succeeded(&self) -> bool {
        self.hosts.iter().all(|h| h.success)
    }

    pub fn success_count(&self) -> usize {
        self.hosts.iter().filter(|h| h.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.hosts.iter().filter(|h| !h.success).count()
    }
}

pub struct BootstrapEngine {
    executor: Arc<dyn CommandExecutor>,
    network: Arc<dyn NetworkProvider>,
    network_config: Value,
    settings: BootstrapSettings,
}

impl BootstrapEngine {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        network: Arc<dyn NetworkProvider>,
        network_config: Value,
        settings: BootstrapSettings,
    ) -> Self {
        Self {
            executor,
            network,
            network_config,
            settings,
        }
    }

    /// Bootstrap every host concurrently. The result mirrors the
    /// input order regardless of completion timing.
    pub async fn run(&self, hosts: &[Host]) -> Result<BootstrapResult> {
        // Global preconditions: a broken service setup aborts before
        // any host work starts.
        if self.settings.ssh_user.is_empty() {
            return Err(BootstrapError::Global {
                message: "bootstrap ssh user is empty".to_string(),
            }
            .into());
        }
        if let Some(host) = hosts.iter().find(|h| h.logical_id.is_empty()) {
            return Err(BootstrapError::Global {
                message: format!(
                    "host '{}' has an empty logical id",
                    host.display_name()
                ),
            }
            .into());
        }

        let mut handles: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(hosts.len());
        for host in hosts {
            let host = host.clone();
            let executor = Arc::clone(&self.executor);
            let network = Arc::clone(&self.network);
            let network_config = self.network_config.clone();
            handles.push(tokio::spawn(async move {
                bootstrap_host(&host, executor.as_ref(), network.as_ref(), &network_config).await
            }));
        }

        // Join in input order so the result set is deterministic.
        let mut outcomes = Vec::with_capacity(hosts.len());
        for (host, handle) in hosts.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(Ok(())) => HostOutcome {
                    host: host.clone(),
                    success: true,
                    error: None,
                },
                Ok(Err(e)) => HostOutcome {
                    host: host.clone(),
                    success: false,
                    error: Some(format!("{e:#}")),
                },
                Err(join_err) => HostOutcome {
                    host: host.clone(),
                    success: false,
                    error: Some(format!("bootstrap task panicked: {join_err}")),
                },
            };
            outcomes.push(outcome);
        }

        Ok(BootstrapResult { hosts: outcomes })
    }
}

/// Sequential bootstrap of a single host: base tooling first, then
/// mesh membership.
async fn bootstrap_host(
    host: &Host,
    executor: &dyn CommandExecutor,
    network: &dyn NetworkProvider,
    network_config: &Value,
) -> Result<()> {
    tracing::info!(host = %host.logical_id, "bootstrapping host");

    let output = executor
        .run(
            host,
            "command -v docker >/dev/null 2>&1 || curl -fsSL https://get.docker.com | sh",
        )
        .await?;
    if !output.success() {
        anyhow::bail!(
            "installing docker on {} failed: {}",
            host.logical_id,
            output.error_line()
        );
    }

    network
        .ensure_installed(host, executor, network_config)
        .await?;
    network
        .ensure_joined(host, executor, network_config)
        .await?;

    tracing::info!(host = %host.logical_id, "host bootstrapped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::exec::{ExecOutput, NoopExecutor};
    use crate::providers::network::NoopNetwork;

    fn host(id: &str) -> Host {
        Host {
            logical_id: id.to_string(),
            name: format!("{id}.example.com"),
            role: "web".to_string(),
            public_ip: "203.0.113.7".to_string(),
            tags: Vec::new(),
        }
    }

    fn settings() -> BootstrapSettings {
        BootstrapSettings {
            ssh_user: "root".to_string(),
        }
    }

    /// Fails on selected hosts, with a per-host delay so completion
    /// order differs from input order.
    struct FlakyExecutor {
        fail_on: Vec<String>,
    }

    #[async_trait]
    impl CommandExecutor for FlakyExecutor {
        async fn run(&self, host: &Host, _command: &str) -> Result<ExecOutput> {
            // First host sleeps longest: completion order is reversed.
            let delay = match host.logical_id.as_str() {
                "host-1" => 30,
                "host-2" => 15,
                _ => 1,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if self.fail_on.contains(&host.logical_id) {
                return Ok(ExecOutput {
                    exit_code: 255,
                    stdout: String::new(),
                    stderr: "SSH connection failed".to_string(),
                });
            }
            Ok(ExecOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn engine_with(executor: Arc<dyn CommandExecutor>) -> BootstrapEngine {
        BootstrapEngine::new(
            executor,
            Arc::new(NoopNetwork),
            Value::Null,
            settings(),
        )
    }

    #[tokio::test]
    async fn test_result_mirrors_input_order() {
        let engine = engine_with(Arc::new(FlakyExecutor { fail_on: vec![] }));
        let hosts = vec![host("host-1"), host("host-2"), host("host-3")];
        let result = engine.run(&hosts).await.unwrap();

        let ids: Vec<&str> = result
            .hosts
            .iter()
            .map(|o| o.host.logical_id.as_str())
            .collect();
        assert_eq!(ids, vec!["host-1", "host-2", "host-3"]);
        assert!(result.all_succeeded());
        assert_eq!(result.success_count(), 3);
    }

    #[tokio::test]
    async fn test_per_host_failure_does_not_stop_others() {
        let engine = engine_with(Arc::new(FlakyExecutor {
            fail_on: vec!["host-2".to_string()],
        }));
        let hosts = vec![host("host-1"), host("host-2")];
        let result = engine.run(&hosts).await.unwrap();

        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failure_count(), 1);
        assert!(result.hosts[0].success);
        assert!(!result.hosts[1].success);
        assert!(result.hosts[1]
            .error
            .as_deref()
            .unwrap()
            .contains("SSH connection failed"));
    }

    #[tokio::test]
    async fn test_global_failure_returns_no_result() {
        let engine = BootstrapEngine::new(
            Arc::new(NoopExecutor),
            Arc::new(NoopNetwork),
            Value::Null,
            BootstrapSettings {
                ssh_user: String::new(),
            },
        );
        let err = engine.run(&[host("host-1")]).await.unwrap_err();
        assert!(err.to_string().contains("bootstrap failed globally"));
    }

    #[tokio::test]
    async fn test_empty_logical_id_is_global_failure() {
        let engine = engine_with(Arc::new(NoopExecutor));
        let mut bad = host("host-1");
        bad.logical_id.clear();
        let err = engine.run(&[bad]).await.unwrap_err();
        assert!(err.to_string().contains("empty logical id"));
    }

    #[tokio::test]
    async fn test_empty_host_list_succeeds() {
        let engine = engine_with(Arc::new(NoopExecutor));
        let result = engine.run(&[]).await.unwrap();
        assert!(result.all_succeeded());
        assert_eq!(result.hosts.len(), 0);
    }
}
