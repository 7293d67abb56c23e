//! Infra commands: bootstrap an environment's hosts.

use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use crate::bootstrap::{BootstrapEngine, BootstrapResult, BootstrapSettings};
use crate::config::Config;
use crate::domain::hostplan::Host;
use crate::error::BootstrapError;
use crate::exec::{CommandExecutor, NoopExecutor, SshExecutor};
use crate::providers::{self, NetworkProvider};
use crate::ui;

use super::GlobalOpts;

/// `infra up --env E`: bootstrap every host concurrently and report
/// per-host outcomes in input order. Exit semantics: all succeeded
/// is success, a global failure aborts, a mixed outcome maps to the
/// partial-failure exit code.
pub async fn up(opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;
    let env = config.environment(&opts.env)?.clone();

    let hosts = resolve_hosts(&config, &env)?;
    if hosts.is_empty() {
        ui::print_info(&format!(
            "No hosts to bootstrap for environment '{}'",
            opts.env
        ));
        return Ok(());
    }

    let (network, network_config) = resolve_network(&config)?;
    let executor: Arc<dyn CommandExecutor> = if opts.dry_run {
        Arc::new(NoopExecutor)
    } else {
        Arc::new(SshExecutor::new(env.ssh_user())?)
    };

    let engine = BootstrapEngine::new(
        executor,
        network,
        network_config,
        BootstrapSettings {
            ssh_user: env.ssh_user(),
        },
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template"),
    );
    spinner.set_message(format!(
        "Bootstrapping {} host(s) in '{}'...",
        hosts.len(),
        opts.env
    ));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let result = engine.run(&hosts).await;
    spinner.finish_and_clear();
    let result = result?;

    report(&result);

    match (result.success_count(), result.failure_count()) {
        (_, 0) => {
            ui::print_success(&format!(
                "Bootstrapped {} host(s) in '{}'",
                result.success_count(),
                opts.env
            ));
            Ok(())
        }
        (0, failed) => Err(BootstrapError::AllHostsFailed { total: failed }.into()),
        (_, failed) => Err(BootstrapError::Partial {
            failed,
            total: result.hosts.len(),
        }
        .into()),
    }
}

/// Host list for bootstrap: the cloud provider when configured,
/// otherwise the environment's static hosts. No implicit local
/// fallback here; there is nothing to bootstrap on the operator's
/// own machine.
fn resolve_hosts(
    config: &Config,
    env: &crate::config::EnvironmentConfig,
) -> Result<Vec<Host>> {
    if let Some(cloud) = &config.cloud {
        let provider = providers::clouds().get(&cloud.provider)?;
        return provider.hosts(&cloud.provider_config(), env);
    }
    let mut hosts: Vec<Host> = env.hosts.iter().map(|h| h.to_host()).collect();
    hosts.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
    Ok(hosts)
}

fn resolve_network(config: &Config) -> Result<(Arc<dyn NetworkProvider>, Value)> {
    match &config.network {
        Some(network) => Ok((
            providers::networks().get(&network.provider)?,
            network.provider_config(),
        )),
        None => Ok((providers::networks().get("none")?, Value::Null)),
    }
}

fn report(result: &BootstrapResult) {
    for outcome in &result.hosts {
        ui::print_status_line(
            outcome.success,
            &outcome.host.logical_id,
            outcome.error.as_deref(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::config::EnvironmentConfig;
    use crate::error;
    use crate::exec::ExecOutput;
    use crate::providers::CloudProvider;
    use crate::providers::ProviderStep;

    /// Cloud provider handing out a fixed host list, as a test
    /// double for `infra up`.
    struct FakeCloud;

    #[async_trait]
    impl CloudProvider for FakeCloud {
        fn id(&self) -> &'static str {
            "fake"
        }

        fn plan(&self, _: &Value, _: &EnvironmentConfig) -> Result<Vec<ProviderStep>> {
            Ok(Vec::new())
        }

        async fn apply(&self, _: &Value, _: &EnvironmentConfig, _: bool) -> Result<()> {
            Ok(())
        }

        fn hosts(&self, _: &Value, _: &EnvironmentConfig) -> Result<Vec<Host>> {
            Ok(vec![
                Host {
                    logical_id: "host-1".to_string(),
                    name: String::new(),
                    role: "web".to_string(),
                    public_ip: "203.0.113.1".to_string(),
                    tags: Vec::new(),
                },
                Host {
                    logical_id: "host-2".to_string(),
                    name: String::new(),
                    role: "web".to_string(),
                    public_ip: "203.0.113.2".to_string(),
                    tags: Vec::new(),
                },
            ])
        }
    }

    /// Executor that fails host-2 with an SSH error.
    struct HalfBrokenExecutor;

    #[async_trait]
    impl CommandExecutor for HalfBrokenExecutor {
        async fn run(&self, host: &Host, _command: &str) -> Result<ExecOutput> {
            if host.logical_id == "host-2" {
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

    #[tokio::test]
    async fn test_partial_failure_maps_to_exit_10() {
        providers::register_builtins();
        let env = EnvironmentConfig::default();
        let hosts = FakeCloud.hosts(&Value::Null, &env).unwrap();

        let engine = BootstrapEngine::new(
            Arc::new(HalfBrokenExecutor),
            providers::networks().get("none").unwrap(),
            Value::Null,
            BootstrapSettings {
                ssh_user: "root".to_string(),
            },
        );
        let result = engine.run(&hosts).await.unwrap();

        // Outcomes mirror provider order: host-1 then host-2.
        assert!(result.hosts[0].success);
        assert!(!result.hosts[1].success);
        assert!(result.hosts[1]
            .error
            .as_deref()
            .unwrap()
            .contains("SSH connection failed"));

        let err = anyhow::Error::from(BootstrapError::Partial {
            failed: result.failure_count(),
            total: result.hosts.len(),
        });
        assert_eq!(error::exit_code(&err), error::EXIT_BOOTSTRAP_PARTIAL);
    }

    #[test]
    fn test_resolve_hosts_prefers_cloud_provider() {
        providers::register_builtins();
        providers::clouds().register("fake", Arc::new(FakeCloud));

        let config = Config::from_yaml(
            r#"
project:
  name: test-app
cloud:
  provider: fake
environments:
  staging:
    driver: remote
"#,
        )
        .unwrap();
        let env = config.environment("staging").unwrap();
        let hosts = resolve_hosts(&config, env).unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].logical_id, "host-1");
    }
}
