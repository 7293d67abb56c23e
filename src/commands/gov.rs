//! Governance reporting.
//!
//! `gov feature-mapping` maps user-facing features to the commands
//! and config components that implement them, flags the ones the
//! current project has not configured, and persists the report under
//! `.stagecraft/reports/` for pre-commit tooling to diff.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use crate::config::Config;
use crate::ui;

use super::GlobalOpts;

/// Set to skip the report-write side effect in pre-commit hooks.
pub const SKIP_GOV_ENV: &str = "SKIP_GOV_PRE_COMMIT";

#[derive(Debug, Clone, Serialize)]
pub struct FeatureMapping {
    pub feature: &'static str,
    pub commands: Vec<&'static str>,
    pub components: Vec<&'static str>,
    /// Whether this project's config enables the feature.
    pub configured: bool,
}

pub async fn feature_mapping(opts: &GlobalOpts, format: String) -> Result<()> {
    let config = opts.load_config()?;
    let mappings = build_mappings(&config);

    match format.as_str() {
        "text" => {
            for mapping in &mappings {
                let marker = if mapping.configured {
                    "on ".green()
                } else {
                    "off".dimmed()
                };
                println!(
                    "   {} {:<16} commands: {:<28} components: {}",
                    marker,
                    mapping.feature,
                    mapping.commands.join(", "),
                    mapping.components.join(", ")
                );
            }
        }
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&mappings).context("serializing feature mapping")?
        ),
        other => bail!("unknown format '{other}' (expected text or json)"),
    }

    if std::env::var(SKIP_GOV_ENV).is_ok() {
        tracing::debug!("{} set; skipping report write", SKIP_GOV_ENV);
        return Ok(());
    }
    if opts.dry_run {
        return Ok(());
    }

    let reports_dir = opts.workdir()?.join(".stagecraft/reports");
    std::fs::create_dir_all(&reports_dir)
        .with_context(|| format!("creating {}", reports_dir.display()))?;
    let path = reports_dir.join("feature-mapping.json");
    let report = json!({
        "project": config.project.name,
        "features": mappings,
    });
    std::fs::write(
        &path,
        format!("{}\n", serde_json::to_string_pretty(&report)?),
    )
    .with_context(|| format!("writing {}", path.display()))?;
    ui::print_info(&format!("Report written to {}", path.display()));
    Ok(())
}

/// Static feature table crossed with the project's configuration.
fn build_mappings(config: &Config) -> Vec<FeatureMapping> {
    vec![
        FeatureMapping {
            feature: "build",
            commands: vec!["build", "deploy"],
            components: vec!["backend"],
            configured: config.backend.is_some(),
        },
        FeatureMapping {
            feature: "dev-topology",
            commands: vec!["dev"],
            components: vec!["backend", "frontend"],
            configured: config.backend.is_some() || config.frontend.is_some(),
        },
        FeatureMapping {
            feature: "migrations",
            commands: vec!["migrate", "deploy"],
            components: vec!["databases"],
            configured: config
                .databases
                .values()
                .any(|db| db.migration.is_some()),
        },
        FeatureMapping {
            feature: "release-history",
            commands: vec!["deploy", "rollback", "releases"],
            components: vec![],
            configured: true,
        },
        FeatureMapping {
            feature: "host-plans",
            commands: vec!["plan", "agent"],
            components: vec!["environments"],
            configured: config
                .environments
                .values()
                .any(|env| !env.hosts.is_empty()),
        },
        FeatureMapping {
            feature: "infra-bootstrap",
            commands: vec!["infra"],
            components: vec!["cloud", "network"],
            configured: config.cloud.is_some() || config.network.is_some(),
        },
    ]
}
