//! Migration engine contract and the SQL-file implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::error::ExecutionError;
use crate::exec::capture_local;

use super::ProviderStep;

/// Inputs to a migration run for one database.
#[derive(Debug, Clone)]
pub struct MigrationRequest {
    pub database: String,
    /// Name of the env var carrying the connection string.
    pub connection_env: String,
    pub directory: PathBuf,
    pub dry_run: bool,
}

#[async_trait]
pub trait MigrationEngine: Send + Sync {
    fn id(&self) -> &'static str;

    /// Pure planning: which migrations would run, in order.
    fn plan(&self, request: &MigrationRequest) -> Result<Vec<ProviderStep>>;

    /// Apply the migrations. Any error fails the surrounding phase.
    async fn run(&self, request: &MigrationRequest) -> Result<()>;
}

/// Applies `*.sql` files through psql in filename order.
pub struct SqlMigrationEngine;

impl SqlMigrationEngine {
    fn migration_files(directory: &PathBuf) -> Result<Vec<PathBuf>> {
        let pattern = directory.join("*.sql");
        let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
            .with_context(|| format!("listing migrations under {}", directory.display()))?
            .filter_map(|entry| entry.ok())
            .collect();
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl MigrationEngine for SqlMigrationEngine {
    fn id(&self) -> &'static str {
        "sql"
    }

    fn plan(&self, request: &MigrationRequest) -> Result<Vec<ProviderStep>> {
        let files = Self::migration_files(&request.directory)?;
        Ok(files
            .iter()
            .map(|file| {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                ProviderStep::new(
                    name.clone(),
                    format!("Apply {} to database '{}'", name, request.database),
                )
            })
            .collect())
    }

    async fn run(&self, request: &MigrationRequest) -> Result<()> {
        let files = Self::migration_files(&request.directory)?;
        if files.is_empty() {
            tracing::info!(
                database = %request.database,
                directory = %request.directory.display(),
                "no migration files to apply"
            );
            return Ok(());
        }

        let connection = std::env::var(&request.connection_env).with_context(|| {
            format!(
                "connection env var {} is not set for database '{}'",
                request.connection_env, request.database
            )
        })?;

        if request.dry_run {
            tracing::info!(
                database = %request.database,
                count = files.len(),
                "dry-run: skipping migration execution"
            );
            return Ok(());
        }

        which::which("psql").map_err(|_| ExecutionError::BinaryNotFound {
            binary: "psql".to_string(),
        })?;

        for file in files {
            let path = file.to_string_lossy().to_string();
            tracing::info!(database = %request.database, file = %path, "applying migration");
            let output =
                capture_local("psql", &[&connection, "-v", "ON_ERROR_STOP=1", "-f", &path])
                    .await?;
            if !output.success() {
                bail!(
                    "migration {} failed for database '{}': {}",
                    path,
                    request.database,
                    output.error_line()
                );
            }
        }
        Ok(())
    }
}
