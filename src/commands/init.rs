//! Init command: write a minimal project configuration.

use std::io::Write as _;

use anyhow::{Context, Result};

use crate::config::starter_config;
use crate::error::ValidationError;
use crate::ui;

use super::GlobalOpts;

pub async fn execute(
    opts: &GlobalOpts,
    project_name: Option<String>,
    non_interactive: bool,
) -> Result<()> {
    let path = &opts.config_path;
    if path.exists() {
        return Err(ValidationError::ConfigExists {
            path: path.display().to_string(),
        }
        .into());
    }

    let default_name = default_project_name();
    let name = match project_name {
        Some(name) => name,
        None if non_interactive => default_name,
        None => prompt_project_name(&default_name)?,
    };

    let content = starter_config(&name);
    if opts.dry_run {
        ui::print_info(&format!("dry-run: would write {}", path.display()));
        print!("{content}");
        return Ok(());
    }

    std::fs::write(path, content)
        .with_context(|| format!("writing {}", path.display()))?;
    ui::print_success(&format!(
        "Initialized project '{}' in {}",
        name,
        path.display()
    ));
    println!("   next: stagecraft dev");
    Ok(())
}

fn default_project_name() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "my-app".to_string())
}

fn prompt_project_name(default_name: &str) -> Result<String> {
    print!("Project name [{default_name}]: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    Ok(if trimmed.is_empty() {
        default_name.to_string()
    } else {
        trimmed.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::opts;

    #[tokio::test]
    async fn test_init_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        let opts = opts(dir.path(), "dev", false);
        execute(&opts, Some("demo".to_string()), true).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("stagecraft.yml")).unwrap();
        assert!(written.contains("name: demo"));
    }

    #[tokio::test]
    async fn test_init_refuses_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stagecraft.yml"), "project:\n  name: x\n").unwrap();
        let opts = opts(dir.path(), "dev", false);

        let err = execute(&opts, Some("demo".to_string()), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_init_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let opts = opts(dir.path(), "dev", true);
        execute(&opts, Some("demo".to_string()), true).await.unwrap();
        assert!(!dir.path().join("stagecraft.yml").exists());
    }
}
