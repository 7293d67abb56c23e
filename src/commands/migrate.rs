//! Migrate command: plan or run database migrations directly.

use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::providers::{self, MigrationRequest};
use crate::ui;

use super::GlobalOpts;

pub async fn execute(opts: &GlobalOpts, database: Option<String>, plan_only: bool) -> Result<()> {
    let config = opts.load_config()?;
    let workdir = opts.workdir()?;

    let selected: Vec<&String> = match &database {
        Some(name) => {
            if !config.databases.contains_key(name) {
                let available = config
                    .databases
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                bail!("unknown database '{name}'. Configured databases: {available}");
            }
            vec![database.as_ref().expect("checked above")]
        }
        None => config.databases.keys().collect(),
    };

    if selected.is_empty() {
        ui::print_info("No databases configured; nothing to migrate");
        return Ok(());
    }

    for name in selected {
        let db = &config.databases[name];
        let Some(migration) = &db.migration else {
            ui::print_info(&format!("database '{name}' has no migration block; skipping"));
            continue;
        };

        let engine = providers::migrations().get(&migration.engine)?;
        let request = MigrationRequest {
            database: name.clone(),
            connection_env: db.connection_env.clone(),
            directory: workdir.join(&migration.directory),
            dry_run: opts.dry_run,
        };

        // Dry runs stay on the engine's pure planning surface.
        if plan_only || opts.dry_run {
            let steps = engine.plan(&request)?;
            println!("{} ({} pending)", name.cyan().bold(), steps.len());
            for step in steps {
                println!("   - {}: {}", step.name, step.description);
            }
        } else {
            engine
                .run(&request)
                .await
                .with_context(|| format!("running migrations for database '{name}'"))?;
            ui::print_success(&format!("Migrations applied for database '{name}'"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::{opts, write_config};

    const DB_YAML: &str = r#"
project:
  name: test-app
environments:
  dev:
    driver: local
databases:
  main:
    connection_env: DATABASE_URL
    migration:
      engine: sql
      directory: migrations
"#;

    #[tokio::test]
    async fn test_migrate_plan_lists_pending() {
        crate::providers::register_builtins();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), DB_YAML);
        // Note: the plan path never needs a connection string.
        let opts = opts(dir.path(), "dev", false);
        execute(&opts, None, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrate_unknown_database() {
        crate::providers::register_builtins();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), DB_YAML);
        let opts = opts(dir.path(), "dev", false);
        let err = execute(&opts, Some("analytics".to_string()), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("analytics"));
        assert!(err.to_string().contains("main"));
    }
}
