//! Release history commands.

use anyhow::Result;
use colored::Colorize;

use crate::domain::release::{PhaseStatus, Release, CANONICAL_PHASES};
use crate::store::ReleaseStore;

use super::GlobalOpts;

/// `releases list [--env E]`: newest first; without `--env`, grouped
/// by environment in ascending alphabetical order.
pub async fn list(opts: &GlobalOpts, env: Option<String>) -> Result<()> {
    let workdir = opts.workdir()?;
    let store = ReleaseStore::open(&workdir)?;

    match env {
        Some(env) => {
            let releases = store.list_releases(&env);
            if releases.is_empty() {
                println!("No releases for environment '{env}'");
                return Ok(());
            }
            for release in &releases {
                print_release_line(release);
            }
        }
        None => {
            let grouped = store.list_all_releases();
            if grouped.is_empty() {
                println!("No releases recorded");
                return Ok(());
            }
            for (env, releases) in &grouped {
                println!("{}", env.cyan().bold());
                for release in releases {
                    print_release_line(release);
                }
            }
        }
    }
    Ok(())
}

/// `releases show <release-id>`: one release with its phase table.
pub async fn show(opts: &GlobalOpts, release_id: &str) -> Result<()> {
    let workdir = opts.workdir()?;
    let store = ReleaseStore::open(&workdir)?;
    let release = store.get_release(release_id)?;

    println!("{}", release.id.cyan().bold());
    println!("   environment: {}", release.environment);
    println!("   version:     {}", release.version);
    if !release.commit_sha.is_empty() {
        println!("   commit:      {}", release.commit_sha);
    }
    println!("   created:     {}", release.created_at);
    if !release.previous_id.is_empty() {
        println!("   previous:    {}", release.previous_id);
    }
    println!("   status:      {}", colored_status(release.overall_status()));
    println!();
    for phase in CANONICAL_PHASES {
        let status = release.phase_status(phase);
        println!("   {:<13} {}", phase.name(), colored_phase(status));
    }
    Ok(())
}

fn print_release_line(release: &Release) {
    println!(
        "   {}  {:<12} {:<12} {}",
        release.id,
        release.version,
        colored_status(release.overall_status()),
        release.created_at.dimmed()
    );
}

fn colored_status(status: &str) -> colored::ColoredString {
    match status {
        "completed" => status.green(),
        "failed" => status.red(),
        "in_progress" => status.yellow(),
        _ => status.normal(),
    }
}

fn colored_phase(status: PhaseStatus) -> colored::ColoredString {
    match status {
        PhaseStatus::Completed => status.name().green(),
        PhaseStatus::Failed => status.name().red(),
        PhaseStatus::Running => status.name().yellow(),
        PhaseStatus::Skipped => status.name().dimmed(),
        PhaseStatus::Pending => status.name().normal(),
    }
}
