//! Compose file rendering and `docker compose` invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::error::ExecutionError;

use super::run_local;

/// One service entry in a rendered compose file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeService {
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
}

impl ComposeService {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ports: Vec::new(),
            environment: BTreeMap::new(),
            volumes: Vec::new(),
            labels: Vec::new(),
            restart: Some("unless-stopped".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ComposeFile<'a> {
    name: &'a str,
    services: &'a BTreeMap<String, ComposeService>,
}

/// Render a compose document. Services iterate in name order so the
/// output is stable across runs.
pub fn render_compose(project: &str, services: &BTreeMap<String, ComposeService>) -> Result<String> {
    let file = ComposeFile {
        name: project,
        services,
    };
    serde_yaml::to_string(&file).context("rendering compose file")
}

/// Compose file names probed in order, the dev-rendered topology
/// first.
const COMPOSE_CANDIDATES: [&str; 3] = [
    ".stagecraft/dev/compose.yaml",
    "compose.yaml",
    "docker-compose.yml",
];

/// Find the compose file the rollout phase should apply.
pub fn locate_compose_file(workdir: &Path) -> Result<PathBuf> {
    for candidate in COMPOSE_CANDIDATES {
        let path = workdir.join(candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    bail!(
        "no compose file found under {} (looked for {})",
        workdir.display(),
        COMPOSE_CANDIDATES.join(", ")
    )
}

pub struct ComposeRunner;

impl ComposeRunner {
    pub fn new() -> Result<Self> {
        which::which("docker").map_err(|_| ExecutionError::BinaryNotFound {
            binary: "docker".to_string(),
        })?;
        Ok(Self)
    }

    /// `docker compose up`, failing fast on non-zero exit.
    pub async fn up(
        &self,
        compose_file: &Path,
        env_overrides: &BTreeMap<String, String>,
        detach: bool,
    ) -> Result<()> {
        let file = compose_file.to_string_lossy().to_string();
        let mut args = vec!["compose", "-f", file.as_str(), "up"];
        if detach {
            args.push("-d");
        }
        let envs: Vec<(String, String)> = env_overrides
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        run_local("docker", &args, &envs)
            .await
            .with_context(|| format!("compose up with {}", compose_file.display()))
    }
}
