//! Command handlers
//!
//! Each module maps one CLI surface onto the planner, the phase
//! engine, the release store or the bootstrap engine. Handlers share
//! the resolved global flags through [`GlobalOpts`].

pub mod agent;
pub mod build;
pub mod commit;
pub mod context;
pub mod deploy;
pub mod dev;
pub mod gov;
pub mod infra;
pub mod init;
pub mod migrate;
pub mod plan;
pub mod releases;
pub mod rollback;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Config;

/// Global flags every command inherits, after precedence resolution.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    pub config_path: PathBuf,
    pub env: String,
    pub verbose: bool,
    pub dry_run: bool,
}

impl GlobalOpts {
    pub fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path)
    }

    /// The working directory all relative paths resolve against.
    pub fn workdir(&self) -> Result<PathBuf> {
        std::env::current_dir().context("resolving working directory")
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::GlobalOpts;
    use std::path::Path;

    /// Options pointing at a config file inside a temp directory.
    pub fn opts(dir: &Path, env: &str, dry_run: bool) -> GlobalOpts {
        GlobalOpts {
            config_path: dir.join("stagecraft.yml"),
            env: env.to_string(),
            verbose: false,
            dry_run,
        }
    }

    pub fn write_config(dir: &Path, yaml: &str) {
        std::fs::write(dir.join("stagecraft.yml"), yaml).unwrap();
    }

    pub const STAGING_YAML: &str = r#"
project:
  name: test-app
backend:
  provider: docker
  providers:
    docker:
      dockerfile: Dockerfile
environments:
  dev:
    driver: local
  staging:
    driver: local
"#;
}
