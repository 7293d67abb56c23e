//! Dev command: render and start the local development topology.
//!
//! Renders `<cwd>/.stagecraft/dev/compose.yaml` from the project's
//! components, wires domains through a traefik reverse proxy, then
//! starts the stack with the compose runner.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::Config;
use crate::exec::compose::{render_compose, ComposeRunner, ComposeService};
use crate::providers;
use crate::ui;

use super::GlobalOpts;

pub async fn execute(
    opts: &GlobalOpts,
    no_https: bool,
    no_traefik: bool,
    no_hosts: bool,
    detach: bool,
) -> Result<()> {
    let config = opts.load_config()?;
    let env = config.environment(&opts.env)?;
    let domains = env
        .dev
        .as_ref()
        .map(|dev| dev.domains.clone())
        .unwrap_or_default();
    let https = env.dev.as_ref().map(|dev| dev.https).unwrap_or(true) && !no_https;

    let services = render_services(&config, &domains, https, no_traefik)?;
    let compose = render_compose(&config.project.name, &services)?;

    let workdir = opts.workdir()?;
    let dev_dir = workdir.join(".stagecraft/dev");
    let compose_path = dev_dir.join("compose.yaml");

    if opts.dry_run {
        ui::print_info(&format!(
            "dry-run: would write {} and start {} service(s)",
            compose_path.display(),
            services.len()
        ));
        print!("{compose}");
        return Ok(());
    }

    std::fs::create_dir_all(&dev_dir)
        .with_context(|| format!("creating {}", dev_dir.display()))?;
    std::fs::write(&compose_path, &compose)
        .with_context(|| format!("writing {}", compose_path.display()))?;
    if !no_traefik {
        write_traefik_config(&dev_dir, &domains, https)?;
    }
    println!("   wrote {}", compose_path.display().to_string().dimmed());

    if !no_hosts && !domains.is_empty() {
        println!();
        println!("Add to /etc/hosts if these do not resolve:");
        for domain in &domains {
            println!("   127.0.0.1  {domain}");
        }
        println!();
    }

    ComposeRunner::new()?
        .up(&compose_path, &BTreeMap::new(), detach)
        .await?;
    ui::print_success(&format!(
        "Development topology for '{}' is up",
        config.project.name
    ));
    Ok(())
}

/// Assemble the topology: backend, frontend, one postgres per
/// database, and traefik in front when enabled.
fn render_services(
    config: &Config,
    domains: &[String],
    https: bool,
    no_traefik: bool,
) -> Result<BTreeMap<String, ComposeService>> {
    let mut services = BTreeMap::new();

    if let Some(backend) = &config.backend {
        let provider = providers::backends().get(&backend.provider)?;
        let image = format!("{}:dev", config.project.name);
        let mut service = provider.compose_service(&image, &backend.provider_config())?;
        if !no_traefik {
            if let Some(domain) = domains.first() {
                service
                    .labels
                    .push(format!("traefik.http.routers.backend.rule=Host(`{domain}`)"));
            }
        }
        services.insert("backend".to_string(), service);
    }

    if let Some(frontend) = &config.frontend {
        let provider = providers::frontends().get(&frontend.provider)?;
        services.insert(
            "frontend".to_string(),
            provider.compose_service(&frontend.provider_config())?,
        );
    }

    for name in config.databases.keys() {
        let mut service = ComposeService::new("postgres:16-alpine");
        service
            .environment
            .insert("POSTGRES_DB".to_string(), name.clone());
        service
            .environment
            .insert("POSTGRES_HOST_AUTH_METHOD".to_string(), "trust".to_string());
        service
            .volumes
            .push(format!("{name}-data:/var/lib/postgresql/data"));
        services.insert(format!("db-{name}"), service);
    }

    if !no_traefik {
        let mut traefik = ComposeService::new("traefik:v3.1");
        traefik.ports.push("80:80".to_string());
        if https {
            traefik.ports.push("443:443".to_string());
        }
        traefik
            .volumes
            .push("./traefik:/etc/traefik/dynamic:ro".to_string());
        traefik
            .volumes
            .push("/var/run/docker.sock:/var/run/docker.sock:ro".to_string());
        services.insert("traefik".to_string(), traefik);
    }

    Ok(services)
}

/// Static traefik settings under `.stagecraft/dev/traefik/`.
fn write_traefik_config(dev_dir: &Path, domains: &[String], https: bool) -> Result<()> {
    let traefik_dir = dev_dir.join("traefik");
    std::fs::create_dir_all(&traefik_dir)
        .with_context(|| format!("creating {}", traefik_dir.display()))?;

    let mut content = String::from("# Generated by stagecraft dev\n");
    content.push_str("http:\n  routers:\n");
    for (i, domain) in domains.iter().enumerate() {
        content.push_str(&format!(
            "    app-{i}:\n      rule: Host(`{domain}`)\n      service: backend\n"
        ));
        if https {
            content.push_str("      tls: {}\n");
        }
    }
    let path = traefik_dir.join("routes.yaml");
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
