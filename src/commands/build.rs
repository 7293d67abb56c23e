//! Build command: produce (and optionally push) the backend image
//! without creating a release.

use anyhow::{anyhow, Result};

use crate::error::PlanError;
use crate::providers::{self, BuildRequest};
use crate::ui;

use super::deploy::resolve_version;
use super::GlobalOpts;

pub async fn execute(
    opts: &GlobalOpts,
    version: Option<String>,
    push: bool,
    services: Vec<String>,
) -> Result<()> {
    let config = opts.load_config()?;
    config.environment(&opts.env)?;

    // Validate any service filter against the configured services.
    let known = config.service_names();
    for service in &services {
        if !known.contains(service) {
            return Err(PlanError::FilterUnmatched {
                kind: "service",
                value: service.clone(),
                available: known.join(", "),
            }
            .into());
        }
    }
    if !services.is_empty() && !services.contains(&"backend".to_string()) {
        ui::print_info("No buildable services selected; nothing to do");
        return Ok(());
    }

    let backend = config
        .backend
        .as_ref()
        .ok_or_else(|| anyhow!("no backend configured; nothing to build"))?;
    let provider = providers::backends().get(&backend.provider)?;

    let version = resolve_version(version);
    let image = format!("{}:{}", config.project.name, version);

    // Dry runs stay on the provider's pure planning surface.
    if opts.dry_run {
        ui::print_info(&format!("dry-run: would build {image}"));
        for step in provider.plan(&backend.provider_config())? {
            println!("   - {}: {}", step.name, step.description);
        }
        if push {
            ui::print_info(&format!("dry-run: would push {image}"));
        }
        return Ok(());
    }

    let request = BuildRequest {
        workdir: opts.workdir()?,
        image: image.clone(),
        config: backend.provider_config(),
        dry_run: false,
    };
    let built = provider.build(&request).await?;
    ui::print_success(&format!("Built {built}"));

    if push {
        provider.push(&built, &backend.provider_config()).await?;
        ui::print_success(&format!("Pushed {built}"));
    }
    Ok(())
}
