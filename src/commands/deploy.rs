//! Deploy command: create a release and drive it through the
//! six-phase pipeline.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;

use crate::domain::plan::META_VERSION;
use crate::engine::{self, PhaseContext, PhaseFns};
use crate::git;
use crate::planner;
use crate::store::ReleaseStore;
use crate::ui;

use super::GlobalOpts;

pub async fn execute(opts: &GlobalOpts, version: Option<String>) -> Result<()> {
    let workdir = opts.workdir()?;
    let store = ReleaseStore::open(&workdir)?;
    run_deploy(opts, &workdir, &store, version, &PhaseFns::canonical()).await
}

/// Resolve the version to deploy: explicit flag, then git short SHA,
/// then the explicit "unknown" sentinel.
pub(crate) fn resolve_version(version: Option<String>) -> String {
    version
        .filter(|v| !v.is_empty())
        .or_else(|| git::head_short_sha().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The deploy flow with an injectable phase-function record. Tests
/// substitute phase functions here; production passes the canonical
/// record.
pub(crate) async fn run_deploy(
    opts: &GlobalOpts,
    workdir: &Path,
    store: &ReleaseStore,
    version: Option<String>,
    fns: &PhaseFns,
) -> Result<()> {
    let config = Arc::new(opts.load_config()?);
    config.environment(&opts.env)?;

    let version = resolve_version(version);
    let commit_sha = git::head_sha().unwrap_or_default();

    if opts.dry_run {
        let mut plan = planner::plan(&config, &opts.env)
            .context("generating deployment plan")?;
        plan.metadata
            .insert(META_VERSION.to_string(), json!(version));
        ui::print_info(&format!(
            "dry-run: would deploy {} {} to '{}'",
            config.project.name, version, opts.env
        ));
        print!("{}", super::plan::render_text(&plan));
        return Ok(());
    }

    ui::print_header(&format!(
        "Deploy {} {} -> {}",
        config.project.name, version, opts.env
    ));

    let release = store.create_release(&opts.env, &version, &commit_sha)?;
    println!("   release {}", release.id.cyan());

    let mut plan = match planner::plan(&config, &opts.env) {
        Ok(plan) => plan,
        Err(e) => {
            engine::mark_all_failed(store, &release.id);
            return Err(e.context("generating deployment plan"));
        }
    };
    plan.metadata
        .insert(META_VERSION.to_string(), json!(version));

    let ctx = PhaseContext::new(
        Arc::clone(&config),
        opts.env.clone(),
        version.clone(),
        commit_sha,
        workdir.to_path_buf(),
        false,
    );
    engine::run(store, &release.id, &mut plan, &ctx, fns).await?;

    ui::print_success(&format!(
        "Deployed {} {} to '{}' ({})",
        config.project.name, version, opts.env, release.id
    ));
    Ok(())
}
