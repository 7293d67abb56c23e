//! Plan commands: show, lower and slice deployment plans.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::domain::hostplan::EnginePlan;
use crate::domain::plan::{Plan, META_PROVIDER_PLANS, META_VERSION};
use crate::planner::{self, slicer};
use crate::ui;

use super::deploy::resolve_version;
use super::GlobalOpts;

/// `plan --env E [--version V] [--services A,B] [--format text|json]`
pub async fn execute(
    opts: &GlobalOpts,
    version: Option<String>,
    services: Vec<String>,
    format: String,
) -> Result<()> {
    let config = Arc::new(opts.load_config()?);
    let plan = build_plan(&config, &opts.env, version, &services)?;

    match format.as_str() {
        "text" => print!("{}", render_text(&plan)),
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&render_json(&plan))
                .context("serializing plan to JSON")?
        ),
        other => bail!("unknown plan format '{other}' (expected text or json)"),
    }
    Ok(())
}

/// `plan deploy --env E [--json PATH]`: emit the lowered engine plan.
pub async fn execute_deploy(opts: &GlobalOpts, json_path: Option<PathBuf>) -> Result<()> {
    let config = Arc::new(opts.load_config()?);
    let plan = build_plan(&config, &opts.env, None, &[])?;
    let engine_plan = planner::lower(&plan)?;

    match json_path {
        Some(path) => {
            let data = serde_json::to_string_pretty(&engine_plan)
                .context("serializing engine plan")?;
            if opts.dry_run {
                ui::print_info(&format!("dry-run: would write {}", path.display()));
            } else {
                std::fs::write(&path, format!("{data}\n"))
                    .with_context(|| format!("writing {}", path.display()))?;
                ui::print_success(&format!("Wrote engine plan to {}", path.display()));
            }
        }
        None => println!(
            "{}",
            serde_json::to_string_pretty(&engine_plan).context("serializing engine plan")?
        ),
    }
    Ok(())
}

/// `plan slice --plan FILE | --env E [--output-dir DIR]`: per-host
/// plans on disk, one file per host, iterated by sorted host id.
pub async fn execute_slice(
    opts: &GlobalOpts,
    plan_file: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = Arc::new(opts.load_config()?);

    let engine_plan: EnginePlan = match &plan_file {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading engine plan {}", path.display()))?;
            EnginePlan::from_json(&data)
                .with_context(|| format!("parsing engine plan {}", path.display()))?
        }
        None => {
            let plan = build_plan(&config, &opts.env, None, &[])?;
            planner::lower(&plan)?
        }
    };

    let env = config.environment(&engine_plan.environment)?;
    let catalog: Vec<_> = config
        .environment_hosts(env)
        .iter()
        .map(|h| h.to_host())
        .collect();
    let sliced = slicer::slice(&engine_plan, &catalog)?;

    let output_dir =
        output_dir.unwrap_or_else(|| PathBuf::from(".stagecraft").join("hostplans"));

    println!(
        "Sliced {} into {} host plan(s), {} global step(s)",
        engine_plan.plan_id.cyan(),
        sliced.host_plans.len(),
        sliced.global_steps.len()
    );
    for (host_id, host_plan) in &sliced.host_plans {
        let path = output_dir.join(format!("{host_id}.json"));
        if opts.dry_run {
            ui::print_info(&format!(
                "dry-run: would write {} ({} steps)",
                path.display(),
                host_plan.steps.len()
            ));
            continue;
        }
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;
        std::fs::write(&path, format!("{}\n", host_plan.to_json()?))
            .with_context(|| format!("writing {}", path.display()))?;
        println!(
            "   {} {} ({} steps)",
            "wrote".green(),
            path.display(),
            host_plan.steps.len()
        );
    }
    Ok(())
}

/// Plan, stamp the requested version, and apply service filters.
fn build_plan(
    config: &Config,
    env: &str,
    version: Option<String>,
    services: &[String],
) -> Result<Plan> {
    let mut plan =
        planner::plan(config, env).context("generating deployment plan")?;
    plan.metadata.insert(
        META_VERSION.to_string(),
        json!(resolve_version(version)),
    );
    if !services.is_empty() {
        plan = plan.filter_services(services)?;
    }
    Ok(plan)
}

/// Stable text rendering: one numbered line per operation.
pub(crate) fn render_text(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Plan for '{}' (version {})",
        plan.environment,
        plan.version()
    );
    for (i, op) in plan.operations.iter().enumerate() {
        let deps = if op.depends_on.is_empty() {
            String::new()
        } else {
            format!("  (after {})", op.depends_on.join(", "))
        };
        let _ = writeln!(
            out,
            "{:>3}. [{}] {}{}",
            i + 1,
            op.kind,
            op.description,
            deps
        );
    }
    if let Some(provider_plans) = plan.metadata.get(META_PROVIDER_PLANS) {
        if let Some(map) = provider_plans.as_object() {
            for (provider, steps) in map {
                let _ = writeln!(out, "Provider plan ({provider}):");
                if let Some(steps) = steps.as_array() {
                    for step in steps {
                        let _ = writeln!(
                            out,
                            "     - {}: {}",
                            step.get("name").and_then(Value::as_str).unwrap_or("?"),
                            step.get("description")
                                .and_then(Value::as_str)
                                .unwrap_or("")
                        );
                    }
                }
            }
        }
    }
    out
}

/// JSON rendering: env, version, operations and provider plans as a
/// deterministic array sorted by provider id.
pub(crate) fn render_json(plan: &Plan) -> Value {
    let provider_plans: Vec<Value> = plan
        .metadata
        .get(META_PROVIDER_PLANS)
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(provider, steps)| json!({"provider": provider, "steps": steps}))
                .collect()
        })
        .unwrap_or_default();

    json!({
        "env": plan.environment,
        "version": plan.version(),
        "operations": plan.operations,
        "provider_plans": provider_plans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers;

    fn config() -> Config {
        providers::register_builtins();
        Config::from_yaml(
            r#"
project:
  name: test-app
backend:
  provider: docker
  providers:
    docker:
      dockerfile: Dockerfile
      registry: registry.example.com
environments:
  staging:
    driver: local
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_json_shape() {
        let config = config();
        let plan = build_plan(&config, "staging", Some("1.2.3".into()), &[]).unwrap();
        let rendered = render_json(&plan);

        assert_eq!(rendered["env"], "staging");
        assert_eq!(rendered["version"], "1.2.3");
        assert!(rendered["operations"].as_array().unwrap().len() > 0);

        let provider_plans = rendered["provider_plans"].as_array().unwrap();
        assert_eq!(provider_plans.len(), 1);
        assert_eq!(provider_plans[0]["provider"], "docker");
        let steps = provider_plans[0]["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0]["name"], "docker-build");
    }

    #[test]
    fn test_render_text_numbers_operations() {
        let config = config();
        let plan = build_plan(&config, "staging", Some("1.2.3".into()), &[]).unwrap();
        let text = render_text(&plan);
        assert!(text.contains("Plan for 'staging' (version 1.2.3)"));
        assert!(text.contains("  1. [build]"));
        assert!(text.contains("Provider plan (docker):"));
    }

    #[test]
    fn test_build_plan_service_filter_unknown_errors() {
        let config = config();
        let err = build_plan(
            &config,
            "staging",
            None,
            &["frontend".to_string()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("frontend"));
    }
}
