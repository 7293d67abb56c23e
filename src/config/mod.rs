//! # Project Configuration
//!
//! Typed representation of `stagecraft.yml`. One file describes the
//! whole project: components (backend, frontend, migration, cloud,
//! network), environments and databases. Loading produces an
//! immutable tree; validation checks that every addressed provider id
//! is registered and every referenced environment exists.

mod component;
mod database;
mod environment;

pub use component::ComponentConfig;
pub use database::{DatabaseConfig, MigrationConfig};
pub use environment::{DevConfig, EnvironmentConfig, HostConfig, InfraConfig};

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::providers;

/// Default config file name, overridable with `--config` or
/// `STAGECRAFT_CONFIG`.
pub const DEFAULT_CONFIG_FILE: &str = "stagecraft.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    /// Environment used when `--env` is not given on the command line
    /// or through `STAGECRAFT_ENV`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_env: Option<String>,
}

/// The whole project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub project: ProjectConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<ComponentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<ComponentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<ComponentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<ComponentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<ComponentConfig>,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,
}

impl Config {
    /// Load and parse the project file.
    pub fn load(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without touching the filesystem. Used by tests.
    pub fn from_yaml(content: &str) -> Result<Config> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: "<inline>".to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation: non-empty project name and registered
    /// provider ids for every component block that names one.
    pub fn validate(&self) -> Result<()> {
        if self.project.name.is_empty() {
            return Err(ConfigError::MissingField {
                field: "project.name".to_string(),
            }
            .into());
        }
        if let Some(backend) = &self.backend {
            providers::backends().get(&backend.provider)?;
        }
        if let Some(frontend) = &self.frontend {
            providers::frontends().get(&frontend.provider)?;
        }
        if let Some(migration) = &self.migration {
            providers::migrations().get(&migration.provider)?;
        }
        if let Some(cloud) = &self.cloud {
            providers::clouds().get(&cloud.provider)?;
        }
        if let Some(network) = &self.network {
            providers::networks().get(&network.provider)?;
        }
        for (name, db) in &self.databases {
            if db.connection_env.is_empty() {
                return Err(ConfigError::MissingField {
                    field: format!("databases.{name}.connection_env"),
                }
                .into());
            }
            if let Some(migration) = &db.migration {
                providers::migrations().get(&migration.engine)?;
            }
        }
        Ok(())
    }

    /// Look up an environment, or fail listing the available names.
    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig, ConfigError> {
        self.environments
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: name.to_string(),
                available: self
                    .environments
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Deployable service names in stable (sorted) order.
    pub fn service_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.backend.is_some() {
            names.push("backend".to_string());
        }
        if self.frontend.is_some() {
            names.push("frontend".to_string());
        }
        names.sort();
        names
    }

    /// Hosts declared for an environment, sorted by logical id.
    /// Environments without hosts deploy to the implicit local host.
    pub fn environment_hosts(&self, env: &EnvironmentConfig) -> Vec<HostConfig> {
        let mut hosts = env.hosts.clone();
        if hosts.is_empty() {
            hosts.push(HostConfig::local());
        }
        hosts.sort_by(|a, b| a.id.cmp(&b.id));
        hosts
    }
}

/// Render a minimal starter config for `stagecraft init`.
pub fn starter_config(project_name: &str) -> String {
    format!(
        "project:\n  name: {project_name}\n\nbackend:\n  provider: docker\n  providers:\n    docker:\n      dockerfile: Dockerfile\n      context: .\n\nenvironments:\n  dev:\n    driver: local\n    dev:\n      domains:\n        - {project_name}.localhost\n  staging:\n    driver: local\n"
    )
}
