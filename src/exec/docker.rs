//! Docker build and push runner.

use std::path::Path;

use anyhow::{Context, Result};

use crate::error::ExecutionError;

use super::run_local;

pub struct DockerRunner;

impl DockerRunner {
    /// Fails when docker is not in PATH.
    pub fn new() -> Result<Self> {
        which::which("docker").map_err(|_| ExecutionError::BinaryNotFound {
            binary: "docker".to_string(),
        })?;
        Ok(Self)
    }

    pub async fn build(
        &self,
        workdir: &Path,
        dockerfile: &str,
        context: &str,
        image: &str,
    ) -> Result<()> {
        let dockerfile_path = workdir.join(dockerfile);
        let context_path = workdir.join(context);
        run_local(
            "docker",
            &[
                "build",
                "-f",
                &dockerfile_path.to_string_lossy(),
                "-t",
                image,
                &context_path.to_string_lossy(),
            ],
            &[],
        )
        .await
        .with_context(|| format!("docker build of {image}"))
    }

    pub async fn push(&self, image: &str) -> Result<()> {
        run_local("docker", &["push", image], &[])
            .await
            .with_context(|| format!("docker push of {image}"))
    }

    pub async fn tag(&self, image: &str, target: &str) -> Result<()> {
        run_local("docker", &["tag", image, target], &[])
            .await
            .with_context(|| format!("tagging {image} as {target}"))
    }
}
