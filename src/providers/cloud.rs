//! Cloud provider contract and the manually-managed implementation.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::EnvironmentConfig;
use crate::domain::hostplan::Host;

use super::ProviderStep;

/// Provisions and enumerates the hosts an environment runs on.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    fn id(&self) -> &'static str;

    /// Pure planning: what `apply` would change.
    fn plan(&self, config: &Value, env: &EnvironmentConfig) -> Result<Vec<ProviderStep>>;

    /// Converge cloud resources toward the declared host set.
    async fn apply(&self, config: &Value, env: &EnvironmentConfig, dry_run: bool) -> Result<()>;

    /// The environment's hosts in a deterministic order.
    fn hosts(&self, config: &Value, env: &EnvironmentConfig) -> Result<Vec<Host>>;
}

/// Hosts are provisioned by the operator; the provider only echoes
/// what the config declares.
pub struct ManualCloud;

#[async_trait]
impl CloudProvider for ManualCloud {
    fn id(&self) -> &'static str {
        "manual"
    }

    fn plan(&self, _config: &Value, env: &EnvironmentConfig) -> Result<Vec<ProviderStep>> {
        Ok(env
            .hosts
            .iter()
            .map(|host| {
                ProviderStep::new(
                    format!("host-{}", host.id),
                    format!("Verify host {} is reachable", host.id),
                )
            })
            .collect())
    }

    async fn apply(&self, _config: &Value, env: &EnvironmentConfig, _dry_run: bool) -> Result<()> {
        tracing::info!(
            hosts = env.hosts.len(),
            "manual cloud provider: hosts are operator-managed, nothing to apply"
        );
        Ok(())
    }

    fn hosts(&self, _config: &Value, env: &EnvironmentConfig) -> Result<Vec<Host>> {
        let mut hosts: Vec<Host> = env.hosts.iter().map(|h| h.to_host()).collect();
        hosts.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;

    fn env_with_hosts() -> EnvironmentConfig {
        EnvironmentConfig {
            driver: "remote".to_string(),
            dev: None,
            hosts: vec![
                HostConfig {
                    id: "web-2".to_string(),
                    name: String::new(),
                    role: "web".to_string(),
                    public_ip: "203.0.113.8".to_string(),
                    tags: Vec::new(),
                },
                HostConfig {
                    id: "web-1".to_string(),
                    name: String::new(),
                    role: "web".to_string(),
                    public_ip: "203.0.113.7".to_string(),
                    tags: Vec::new(),
                },
            ],
            infra: None,
        }
    }

    #[test]
    fn test_hosts_sorted_by_logical_id() {
        let hosts = ManualCloud
            .hosts(&Value::Null, &env_with_hosts())
            .unwrap();
        let ids: Vec<&str> = hosts.iter().map(|h| h.logical_id.as_str()).collect();
        assert_eq!(ids, vec!["web-1", "web-2"]);
    }
}
