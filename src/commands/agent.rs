//! Agent command: execute a sliced host plan on this machine.
//!
//! The agent is deliberately strict about its input: an unknown
//! top-level field, an empty host id or a sparse step index rejects
//! the whole plan before any step runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::domain::hostplan::{HostPlan, HostStep, StepAction};
use crate::exec::compose::{locate_compose_file, ComposeRunner};
use crate::exec::capture_local;
use crate::ui;

use super::GlobalOpts;

/// Outcome of one executed step, persisted with `--output`.
#[derive(Debug, Serialize)]
pub struct StepResult {
    pub id: String,
    pub action: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub async fn run(opts: &GlobalOpts, hostplan: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let workdir = opts.workdir()?;
    run_in(&workdir, hostplan, output, opts.dry_run).await
}

pub(crate) async fn run_in(
    workdir: &Path,
    hostplan: PathBuf,
    output: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let data = std::fs::read_to_string(&hostplan)
        .with_context(|| format!("reading host plan {}", hostplan.display()))?;
    let plan = HostPlan::from_json(&data)
        .with_context(|| format!("parsing host plan {}", hostplan.display()))?;

    println!(
        "Executing plan {} for host {} ({} steps)",
        plan.plan_id.cyan(),
        plan.host.logical_id.cyan(),
        plan.steps.len()
    );

    let mut results = Vec::new();
    let mut failure: Option<anyhow::Error> = None;

    for step in &plan.steps {
        match execute_step(workdir, step, dry_run).await {
            Ok(()) => {
                ui::print_status_line(true, &format!("{} {}", step.action, step.id), None);
                results.push(StepResult {
                    id: step.id.clone(),
                    action: step.action.name().to_string(),
                    success: true,
                    message: None,
                });
            }
            Err(e) => {
                let message = format!("{e:#}");
                ui::print_status_line(
                    false,
                    &format!("{} {}", step.action, step.id),
                    Some(&message),
                );
                results.push(StepResult {
                    id: step.id.clone(),
                    action: step.action.name().to_string(),
                    success: false,
                    message: Some(message),
                });
                failure = Some(e.context(format!("executing step '{}'", step.id)));
                break;
            }
        }
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&results)
            .context("serializing step results")?;
        std::fs::write(&path, format!("{json}\n"))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("   results written to {}", path.display());
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Dispatch one step. Global work (build, migrate) never appears in
/// a host step list; a plan carrying one is rejected.
async fn execute_step(workdir: &Path, step: &HostStep, dry_run: bool) -> Result<()> {
    match step.action {
        StepAction::RenderCompose => render_compose_step(workdir, step, dry_run),
        StepAction::ApplyCompose | StepAction::Rollout => {
            apply_compose_step(workdir, dry_run).await
        }
        StepAction::HealthCheck => health_check_step(workdir, dry_run).await,
        StepAction::Build | StepAction::Migrate => {
            bail!(
                "action '{}' is global work and cannot run as a host step",
                step.action
            )
        }
    }
}

/// Write inline compose content when the step carries it; otherwise
/// the topology is distributed out of band and there is nothing to
/// render here.
fn render_compose_step(workdir: &Path, step: &HostStep, dry_run: bool) -> Result<()> {
    let Some(content) = step.inputs.get("compose").and_then(Value::as_str) else {
        tracing::debug!(step = %step.id, "no inline compose content; nothing to render");
        return Ok(());
    };
    let dir = workdir.join(".stagecraft/agent");
    let path = dir.join("compose.yaml");
    if dry_run {
        ui::print_info(&format!("dry-run: would write {}", path.display()));
        return Ok(());
    }
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

async fn apply_compose_step(workdir: &Path, dry_run: bool) -> Result<()> {
    let agent_compose = workdir.join(".stagecraft/agent/compose.yaml");
    let compose_file = if agent_compose.exists() {
        agent_compose
    } else {
        locate_compose_file(workdir)?
    };
    if dry_run {
        ui::print_info(&format!(
            "dry-run: would apply {}",
            compose_file.display()
        ));
        return Ok(());
    }
    ComposeRunner::new()?
        .up(&compose_file, &BTreeMap::new(), true)
        .await
}

async fn health_check_step(workdir: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        ui::print_info("dry-run: would check service health");
        return Ok(());
    }
    let compose_file = locate_compose_file(workdir)?;
    let file = compose_file.to_string_lossy().to_string();
    let output =
        capture_local("docker", &["compose", "-f", &file, "ps", "--status", "running"]).await?;
    if !output.success() {
        bail!("health check failed: {}", output.error_line());
    }
    Ok(())
}
