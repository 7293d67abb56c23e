//! Network provider contract: private mesh membership for hosts.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::hostplan::Host;
use crate::exec::CommandExecutor;

/// Ensures hosts are installed into and joined to the mesh network.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    fn id(&self) -> &'static str;

    async fn ensure_installed(
        &self,
        host: &Host,
        executor: &dyn CommandExecutor,
        config: &Value,
    ) -> Result<()>;

    async fn ensure_joined(
        &self,
        host: &Host,
        executor: &dyn CommandExecutor,
        config: &Value,
    ) -> Result<()>;

    /// Name the host resolves to inside the mesh.
    fn node_fqdn(&self, host: &Host, config: &Value) -> String;
}

/// No mesh: hosts talk over their public addresses.
pub struct NoopNetwork;

#[async_trait]
impl NetworkProvider for NoopNetwork {
    fn id(&self) -> &'static str {
        "none"
    }

    async fn ensure_installed(
        &self,
        host: &Host,
        _executor: &dyn CommandExecutor,
        _config: &Value,
    ) -> Result<()> {
        tracing::debug!(host = %host.logical_id, "no network provider configured");
        Ok(())
    }

    async fn ensure_joined(
        &self,
        _host: &Host,
        _executor: &dyn CommandExecutor,
        _config: &Value,
    ) -> Result<()> {
        Ok(())
    }

    fn node_fqdn(&self, host: &Host, _config: &Value) -> String {
        host.display_name().to_string()
    }
}

/// Joins hosts to a tailscale tailnet.
pub struct TailscaleNetwork;

impl TailscaleNetwork {
    fn auth_key_env(config: &Value) -> String {
        config
            .get("auth_key_env")
            .and_then(Value::as_str)
            .unwrap_or("TAILSCALE_AUTHKEY")
            .to_string()
    }

    fn tailnet_domain(config: &Value) -> String {
        config
            .get("tailnet_domain")
            .and_then(Value::as_str)
            .unwrap_or("ts.net")
            .to_string()
    }
}

#[async_trait]
impl NetworkProvider for TailscaleNetwork {
    fn id(&self) -> &'static str {
        "tailscale"
    }

    async fn ensure_installed(
        &self,
        host: &Host,
        executor: &dyn CommandExecutor,
        _config: &Value,
    ) -> Result<()> {
        let output = executor
            .run(
                host,
                "command -v tailscale >/dev/null 2>&1 || curl -fsSL https://tailscale.com/install.sh | sh",
            )
            .await?;
        if !output.success() {
            bail!(
                "installing tailscale on {} failed: {}",
                host.logical_id,
                output.error_line()
            );
        }
        Ok(())
    }

    async fn ensure_joined(
        &self,
        host: &Host,
        executor: &dyn CommandExecutor,
        config: &Value,
    ) -> Result<()> {
        let key_env = Self::auth_key_env(config);
        let command = format!(
            "tailscale status >/dev/null 2>&1 || tailscale up --authkey \"${{{key_env}}}\" --hostname {}",
            host.logical_id
        );
        let output = executor.run(host, &command).await?;
        if !output.success() {
            bail!(
                "joining {} to the tailnet failed: {}",
                host.logical_id,
                output.error_line()
            );
        }
        Ok(())
    }

    fn node_fqdn(&self, host: &Host, config: &Value) -> String {
        format!("{}.{}", host.logical_id, Self::tailnet_domain(config))
    }
}
