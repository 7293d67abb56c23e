//! Project context extraction for handoffs and reviews.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use walkdir::WalkDir;

use crate::ui;

use super::GlobalOpts;

/// `context build`: write a markdown summary of the project
/// (components, environments, databases) to `.stagecraft/context.md`.
pub async fn build(opts: &GlobalOpts) -> Result<()> {
    let config = opts.load_config()?;
    let workdir = opts.workdir()?;

    let mut out = String::new();
    let _ = writeln!(out, "# {} project context\n", config.project.name);

    let _ = writeln!(out, "## Components\n");
    for (name, component) in [
        ("backend", &config.backend),
        ("frontend", &config.frontend),
        ("migration", &config.migration),
        ("cloud", &config.cloud),
        ("network", &config.network),
    ] {
        match component {
            Some(component) => {
                let _ = writeln!(out, "- {name}: provider `{}`", component.provider);
            }
            None => {
                let _ = writeln!(out, "- {name}: not configured");
            }
        }
    }

    let _ = writeln!(out, "\n## Environments\n");
    for (name, env) in &config.environments {
        let _ = writeln!(
            out,
            "- {name}: driver `{}`, {} host(s)",
            env.driver,
            env.hosts.len()
        );
    }

    let _ = writeln!(out, "\n## Databases\n");
    if config.databases.is_empty() {
        let _ = writeln!(out, "- none");
    }
    for (name, db) in &config.databases {
        let migration = db
            .migration
            .as_ref()
            .map(|m| format!("migrations via `{}` from `{}`", m.engine, m.directory))
            .unwrap_or_else(|| "no migrations".to_string());
        let _ = writeln!(out, "- {name}: `{}`, {migration}", db.connection_env);
    }

    if opts.dry_run {
        ui::print_info("dry-run: would write .stagecraft/context.md");
        print!("{out}");
        return Ok(());
    }

    let dir = workdir.join(".stagecraft");
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join("context.md");
    std::fs::write(&path, out).with_context(|| format!("writing {}", path.display()))?;
    ui::print_success(&format!("Context written to {}", path.display()));
    Ok(())
}

/// `context xray`: per-directory source statistics.
pub async fn xray(opts: &GlobalOpts) -> Result<()> {
    let workdir = opts.workdir()?;
    let stats = scan_sources(&workdir);

    if stats.is_empty() {
        println!("No source files found");
        return Ok(());
    }

    println!("{:<24} {:>8} {:>10}", "directory".bold(), "files", "lines");
    for (dir, (files, lines)) in &stats {
        println!("{dir:<24} {files:>8} {lines:>10}");
    }
    Ok(())
}

const SOURCE_EXTENSIONS: [&str; 6] = ["rs", "ts", "tsx", "js", "py", "go"];

/// Count files and lines per top-level directory, skipping
/// dependency and VCS trees.
fn scan_sources(root: &Path) -> BTreeMap<String, (usize, usize)> {
    let mut stats: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !matches!(
            name.as_ref(),
            ".git" | "target" | "node_modules" | ".stagecraft"
        )
    });

    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let extension = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        if !SOURCE_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path());
        let top = relative
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .unwrap_or_default();
        let lines = std::fs::read_to_string(entry.path())
            .map(|content| content.lines().count())
            .unwrap_or(0);
        let slot = stats.entry(top).or_default();
        slot.0 += 1;
        slot.1 += lines;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_sources_groups_by_top_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn x() {}\npub fn y() {}\n")
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored\n").unwrap();

        let stats = scan_sources(dir.path());
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["src"], (2, 3));
    }

    #[test]
    fn test_scan_sources_skips_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        std::fs::write(dir.path().join("target/debug/gen.rs"), "fn x() {}\n").unwrap();
        let stats = scan_sources(dir.path());
        assert!(stats.is_empty());
    }
}
