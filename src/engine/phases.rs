//! Canonical phase implementations
//!
//! The engine is indifferent to what these do; the contracts are:
//! build records the image it produced in `plan.metadata.built_image`,
//! push fails when that key is absent, the migrate phases drive the
//! configured migration engine (never a silent no-op when migrations
//! are configured), rollout applies the compose topology, and
//! finalize only does bookkeeping.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};

use crate::domain::plan::{Plan, META_BUILT_IMAGE};
use crate::exec::compose::{locate_compose_file, ComposeRunner};
use crate::providers::{self, BuildRequest, MigrationRequest};

use super::{PhaseContext, PhaseFuture};

/// Build the backend image and record it for later phases.
pub fn build<'a>(ctx: &'a PhaseContext, plan: &'a mut Plan) -> PhaseFuture<'a> {
    Box::pin(async move {
        let backend = ctx
            .config
            .backend
            .as_ref()
            .ok_or_else(|| anyhow!("no backend configured; nothing to build"))?;
        let provider = providers::backends().get(&backend.provider)?;

        let image = format!("{}:{}", ctx.config.project.name, ctx.version);
        let request = BuildRequest {
            workdir: ctx.workdir.clone(),
            image: image.clone(),
            config: backend.provider_config(),
            dry_run: ctx.dry_run,
        };
        let built = provider
            .build(&request)
            .await
            .with_context(|| format!("building image {image}"))?;

        plan.metadata
            .insert(META_BUILT_IMAGE.to_string(), json!(built));
        Ok(())
    })
}

/// Push the image recorded by the build phase. Not retried.
pub fn push<'a>(ctx: &'a PhaseContext, plan: &'a mut Plan) -> PhaseFuture<'a> {
    Box::pin(async move {
        let image = plan
            .metadata
            .get(META_BUILT_IMAGE)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no built image recorded; did the build phase run?"))?;

        let backend = ctx
            .config
            .backend
            .as_ref()
            .ok_or_else(|| anyhow!("no backend configured; nothing to push"))?;
        let provider = providers::backends().get(&backend.provider)?;

        if ctx.dry_run {
            tracing::info!(image = %image, "dry-run: skipping push");
            return Ok(());
        }
        provider
            .push(&image, &backend.provider_config())
            .await
            .with_context(|| format!("pushing image {image}"))
    })
}

pub fn migrate_pre<'a>(ctx: &'a PhaseContext, _plan: &'a mut Plan) -> PhaseFuture<'a> {
    Box::pin(run_migrations(ctx, MigrationTiming::Pre))
}

pub fn migrate_post<'a>(ctx: &'a PhaseContext, _plan: &'a mut Plan) -> PhaseFuture<'a> {
    Box::pin(run_migrations(ctx, MigrationTiming::Post))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationTiming {
    Pre,
    Post,
}

impl MigrationTiming {
    fn selected(&self, migration: &crate::config::MigrationConfig) -> bool {
        match self {
            Self::Pre => migration.pre_deploy,
            Self::Post => migration.post_deploy,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Pre => "pre-deploy",
            Self::Post => "post-deploy",
        }
    }
}

/// Drive the configured migration engine for every database whose
/// migration block selects this timing. Databases iterate in name
/// order; an unknown engine id is an error, never a silent skip.
async fn run_migrations(ctx: &PhaseContext, timing: MigrationTiming) -> Result<()> {
    for (name, db) in &ctx.config.databases {
        let Some(migration) = &db.migration else {
            continue;
        };
        if !timing.selected(migration) {
            continue;
        }

        let engine = providers::migrations().get(&migration.engine)?;
        let request = MigrationRequest {
            database: name.clone(),
            connection_env: db.connection_env.clone(),
            directory: ctx.workdir.join(&migration.directory),
            dry_run: ctx.dry_run,
        };
        engine.run(&request).await.with_context(|| {
            format!(
                "running {} migrations for database '{}'",
                timing.name(),
                name
            )
        })?;
    }
    Ok(())
}

/// Apply the compose topology with the built image overriding the
/// config default. Fails fast on non-zero exit.
pub fn rollout<'a>(ctx: &'a PhaseContext, plan: &'a mut Plan) -> PhaseFuture<'a> {
    Box::pin(async move {
        let compose_file = locate_compose_file(&ctx.workdir)?;

        let mut overrides = BTreeMap::new();
        if let Some(image) = plan.metadata.get(META_BUILT_IMAGE).and_then(Value::as_str) {
            overrides.insert("STAGECRAFT_IMAGE".to_string(), image.to_string());
        }
        overrides.insert("STAGECRAFT_ENV".to_string(), ctx.environment.clone());

        if ctx.dry_run {
            tracing::info!(
                compose = %compose_file.display(),
                "dry-run: skipping compose up"
            );
            return Ok(());
        }
        ComposeRunner::new()?
            .up(&compose_file, &overrides, true)
            .await
    })
}

/// Last bookkeeping. The release becomes current by having this
/// phase recorded completed; no extra state is written.
pub fn finalize<'a>(ctx: &'a PhaseContext, _plan: &'a mut Plan) -> PhaseFuture<'a> {
    Box::pin(async move {
        tracing::info!(
            environment = %ctx.environment,
            version = %ctx.version,
            "release finalized"
        );
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;

    fn ctx_with(yaml: &str, dry_run: bool) -> (tempfile::TempDir, PhaseContext) {
        providers::register_builtins();
        let config = Config::from_yaml(yaml).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let ctx = PhaseContext::new(
            Arc::new(config),
            "staging",
            "1.0.0",
            "",
            dir.path().to_path_buf(),
            dry_run,
        );
        (dir, ctx)
    }

    const BACKEND_YAML: &str = r#"
project:
  name: test-app
backend:
  provider: docker
environments:
  staging:
    driver: local
"#;

    const NO_BACKEND_YAML: &str = r#"
project:
  name: test-app
environments:
  staging:
    driver: local
"#;

    #[tokio::test]
    async fn test_build_records_built_image() {
        let (_dir, ctx) = ctx_with(BACKEND_YAML, true);
        let mut plan = Plan::new("staging");
        build(&ctx, &mut plan).await.unwrap();
        assert_eq!(
            plan.metadata.get(META_BUILT_IMAGE).unwrap(),
            &json!("test-app:1.0.0")
        );
    }

    #[tokio::test]
    async fn test_build_fails_without_backend() {
        let (_dir, ctx) = ctx_with(NO_BACKEND_YAML, true);
        let mut plan = Plan::new("staging");
        let err = build(&ctx, &mut plan).await.unwrap_err();
        assert!(err.to_string().contains("no backend configured"));
    }

    #[tokio::test]
    async fn test_push_fails_without_built_image() {
        let (_dir, ctx) = ctx_with(BACKEND_YAML, true);
        let mut plan = Plan::new("staging");
        let err = push(&ctx, &mut plan).await.unwrap_err();
        assert!(err.to_string().contains("no built image recorded"));
    }

    #[tokio::test]
    async fn test_migrate_pre_without_databases_is_noop() {
        let (_dir, ctx) = ctx_with(BACKEND_YAML, true);
        let mut plan = Plan::new("staging");
        migrate_pre(&ctx, &mut plan).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrate_fails_on_unknown_engine() {
        // Engine validation happens at lookup time; bypass config
        // validation by constructing the config by hand.
        providers::register_builtins();
        let mut config = Config::from_yaml(BACKEND_YAML).unwrap();
        config.databases.insert(
            "main".to_string(),
            crate::config::DatabaseConfig {
                connection_env: "DATABASE_URL".to_string(),
                migration: Some(crate::config::MigrationConfig {
                    engine: "flyway".to_string(),
                    directory: "migrations".to_string(),
                    pre_deploy: true,
                    post_deploy: false,
                }),
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let ctx = PhaseContext::new(
            Arc::new(config),
            "staging",
            "1.0.0",
            "",
            dir.path().to_path_buf(),
            true,
        );
        let mut plan = Plan::new("staging");
        let err = migrate_pre(&ctx, &mut plan).await.unwrap_err();
        assert!(format!("{err:#}").contains("flyway"));
    }

    #[tokio::test]
    async fn test_rollout_fails_without_compose_file() {
        let (_dir, ctx) = ctx_with(BACKEND_YAML, true);
        let mut plan = Plan::new("staging");
        let err = rollout(&ctx, &mut plan).await.unwrap_err();
        assert!(err.to_string().contains("no compose file"));
    }

    #[tokio::test]
    async fn test_rollout_dry_run_with_compose_file() {
        let (dir, ctx) = ctx_with(BACKEND_YAML, true);
        std::fs::write(dir.path().join("compose.yaml"), "services: {}\n").unwrap();
        let mut plan = Plan::new("staging");
        rollout(&ctx, &mut plan).await.unwrap();
    }

    #[tokio::test]
    async fn test_finalize_is_bookkeeping_only() {
        let (_dir, ctx) = ctx_with(NO_BACKEND_YAML, false);
        let mut plan = Plan::new("staging");
        finalize(&ctx, &mut plan).await.unwrap();
    }
}
