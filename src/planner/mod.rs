//! The planner
//!
//! A pure function from (config, environment) to [`Plan`]: no clock,
//! no environment access, no provider execution. Operations come out
//! in a declared phase order and, within a phase, sorted by their
//! primary attribute (service name, database name, host id), so two
//! runs over equal inputs produce equal plans.

pub mod slicer;

use anyhow::Result;
use serde_json::{json, Value};

use crate::config::Config;
use crate::domain::hostplan::{EnginePlan, EngineStep, ResourceRef, StepAction};
use crate::domain::plan::{OpKind, Operation, Plan, META_PROVIDER_PLANS};
use crate::providers;

/// Build the deployment plan for one environment.
pub fn plan(config: &Config, env_name: &str) -> Result<Plan> {
    let env = config.environment(env_name)?;
    let mut plan = Plan::new(env_name);

    let project = &config.project.name;
    let all_services = config.service_names();
    let hosts = config.environment_hosts(env);

    // Buildable services: components that produce an image.
    let buildable: Vec<&str> = if config.backend.is_some() {
        vec!["backend"]
    } else {
        Vec::new()
    };

    let mut build_ids = Vec::new();
    for service in &buildable {
        let id = format!("build-{service}");
        plan.operations.push(
            Operation::new(
                OpKind::Build,
                id.clone(),
                format!("Build {service} image for project '{project}'"),
            )
            .with_meta("services", json!([service])),
        );
        build_ids.push(id);
    }

    let mut push_ids = Vec::new();
    for service in &buildable {
        let id = format!("push-{service}");
        plan.operations.push(
            Operation::new(OpKind::Push, id.clone(), format!("Push {service} image"))
                .with_deps(vec![format!("build-{service}")])
                .with_meta("services", json!([service])),
        );
        push_ids.push(id);
    }

    let mut migrate_pre_ids = Vec::new();
    for (name, db) in &config.databases {
        let Some(migration) = &db.migration else {
            continue;
        };
        if !migration.pre_deploy {
            continue;
        }
        let id = format!("migrate-pre-{name}");
        plan.operations.push(
            Operation::new(
                OpKind::MigratePre,
                id.clone(),
                format!("Run pre-deploy migrations for database '{name}'"),
            )
            .with_deps(push_ids.clone())
            .with_meta("database", json!(name))
            .with_meta("provider", json!(migration.engine)),
        );
        migrate_pre_ids.push(id);
    }

    let rollout_deps = if !migrate_pre_ids.is_empty() {
        migrate_pre_ids.clone()
    } else if !push_ids.is_empty() {
        push_ids.clone()
    } else {
        Vec::new()
    };

    let mut rollout_ids = Vec::new();
    for host in &hosts {
        let id = format!("rollout-{}", host.id);
        plan.operations.push(
            Operation::new(
                OpKind::Rollout,
                id.clone(),
                format!("Apply compose topology on host '{}'", host.id),
            )
            .with_deps(rollout_deps.clone())
            .with_meta("services", json!(all_services))
            .with_meta("hosts", json!([host.id]))
            .with_meta("roles", json!([host.role])),
        );
        rollout_ids.push(id);
    }

    let mut health_ids = Vec::new();
    for host in &hosts {
        let id = format!("health-{}", host.id);
        plan.operations.push(
            Operation::new(
                OpKind::HealthCheck,
                id.clone(),
                format!("Verify services are healthy on host '{}'", host.id),
            )
            .with_deps(vec![format!("rollout-{}", host.id)])
            .with_meta("hosts", json!([host.id]))
            .with_meta("roles", json!([host.role])),
        );
        health_ids.push(id);
    }

    let mut migrate_post_ids = Vec::new();
    for (name, db) in &config.databases {
        let Some(migration) = &db.migration else {
            continue;
        };
        if !migration.post_deploy {
            continue;
        }
        let id = format!("migrate-post-{name}");
        plan.operations.push(
            Operation::new(
                OpKind::MigratePost,
                id.clone(),
                format!("Run post-deploy migrations for database '{name}'"),
            )
            .with_deps(rollout_ids.clone())
            .with_meta("database", json!(name))
            .with_meta("provider", json!(migration.engine)),
        );
        migrate_post_ids.push(id);
    }

    let finalize_deps = if !migrate_post_ids.is_empty() {
        migrate_post_ids
    } else if !health_ids.is_empty() {
        health_ids
    } else {
        rollout_ids
    };
    plan.operations.push(
        Operation::new(OpKind::Finalize, "finalize", "Record the release as current")
            .with_deps(finalize_deps)
            .with_meta("services", json!(all_services)),
    );

    attach_provider_plans(config, &mut plan);

    // The planner must never emit a cycle or a forward reference.
    plan.validate_order()?;
    Ok(plan)
}

/// Ask the backend provider for its own pure sub-plan and stash it
/// under `metadata.provider_plans`. Provider failures are logged and
/// omitted, never fatal for planning.
fn attach_provider_plans(config: &Config, plan: &mut Plan) {
    let Some(backend) = &config.backend else {
        return;
    };
    let provider = match providers::backends().get(&backend.provider) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!(error = %e, "skipping provider plan");
            return;
        }
    };
    match provider.plan(&backend.provider_config()) {
        Ok(steps) => {
            let mut plans = serde_json::Map::new();
            plans.insert(backend.provider.clone(), json!(steps));
            plan.metadata
                .insert(META_PROVIDER_PLANS.to_string(), Value::Object(plans));
        }
        Err(e) => {
            tracing::warn!(
                provider = %backend.provider,
                error = %e,
                "backend provider plan failed; omitting from plan"
            );
        }
    }
}

/// Lower a plan into engine steps with explicit host attribution.
/// Global work (image build, registry push, migrations) carries no
/// hosts; rollout expands into render + apply per host.
pub fn lower(plan: &Plan) -> Result<EnginePlan> {
    let plan_id = format!("plan-{}-{}", plan.environment, plan.version());
    let mut steps = Vec::new();

    for op in &plan.operations {
        let op_id = op
            .id
            .clone()
            .unwrap_or_else(|| format!("op-{}", steps.len()));
        match op.kind {
            OpKind::Build => steps.push(EngineStep {
                id: op_id,
                action: StepAction::Build,
                resource: ResourceRef {
                    kind: "image".to_string(),
                    name: op.services().join(","),
                    provider: provider_of(op),
                },
                hosts: Vec::new(),
                inputs: json!({"services": op.services()}),
            }),
            OpKind::Push => steps.push(EngineStep {
                id: op_id,
                action: StepAction::Build,
                resource: ResourceRef {
                    kind: "registry".to_string(),
                    name: op.services().join(","),
                    provider: provider_of(op),
                },
                hosts: Vec::new(),
                inputs: json!({"operation": "push", "services": op.services()}),
            }),
            OpKind::MigratePre | OpKind::MigratePost => {
                let database = op
                    .metadata
                    .get("database")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                steps.push(EngineStep {
                    id: op_id,
                    action: StepAction::Migrate,
                    resource: ResourceRef {
                        kind: "database".to_string(),
                        name: database.clone(),
                        provider: provider_of(op),
                    },
                    hosts: Vec::new(),
                    inputs: json!({
                        "database": database,
                        "timing": op.kind.name(),
                    }),
                });
            }
            OpKind::Rollout => {
                for host in op.hosts() {
                    steps.push(EngineStep {
                        id: format!("{op_id}-render"),
                        action: StepAction::RenderCompose,
                        resource: ResourceRef {
                            kind: "compose".to_string(),
                            name: plan.environment.clone(),
                            provider: String::new(),
                        },
                        hosts: vec![host.clone()],
                        inputs: json!({"services": op.services()}),
                    });
                    steps.push(EngineStep {
                        id: format!("{op_id}-apply"),
                        action: StepAction::ApplyCompose,
                        resource: ResourceRef {
                            kind: "compose".to_string(),
                            name: plan.environment.clone(),
                            provider: String::new(),
                        },
                        hosts: vec![host],
                        inputs: json!({"services": op.services()}),
                    });
                }
            }
            OpKind::HealthCheck => {
                for host in op.hosts() {
                    steps.push(EngineStep {
                        id: op_id.clone(),
                        action: StepAction::HealthCheck,
                        resource: ResourceRef {
                            kind: "service".to_string(),
                            name: plan.environment.clone(),
                            provider: String::new(),
                        },
                        hosts: vec![host],
                        inputs: Value::Null,
                    });
                }
            }
            // Finalize is engine bookkeeping; no host or global work.
            OpKind::Finalize => {}
        }
    }

    Ok(EnginePlan {
        plan_id,
        environment: plan.environment.clone(),
        steps,
    })
}

fn provider_of(op: &Operation) -> String {
    op.metadata
        .get("provider")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
