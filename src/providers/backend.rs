//! Backend provider contract and the docker implementation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::exec::compose::ComposeService;
use crate::exec::docker::DockerRunner;

use super::ProviderStep;

/// Everything a backend needs to produce an image.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub workdir: PathBuf,
    /// Full image reference, `<project>:<version>`.
    pub image: String,
    /// Provider-specific block from the project config.
    pub config: Value,
    pub dry_run: bool,
}

/// Builds, pushes and describes the application backend.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    fn id(&self) -> &'static str;

    /// Pure planning: named, described sub-steps. Must not touch the
    /// filesystem, clock or network.
    fn plan(&self, config: &Value) -> Result<Vec<ProviderStep>>;

    /// Produce the image and return its reference.
    async fn build(&self, request: &BuildRequest) -> Result<String>;

    /// Push a previously built image to the registry.
    async fn push(&self, image: &str, config: &Value) -> Result<()>;

    /// The backend's service entry in a rendered compose topology.
    fn compose_service(&self, image: &str, config: &Value) -> Result<ComposeService>;
}

impl std::fmt::Debug for dyn BackendProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn BackendProvider")
            .field("id", &self.id())
            .finish()
    }
}

/// Builds images with the local docker daemon.
pub struct DockerBackend;

impl DockerBackend {
    fn dockerfile(config: &Value) -> String {
        config
            .get("dockerfile")
            .and_then(Value::as_str)
            .unwrap_or("Dockerfile")
            .to_string()
    }

    fn context_dir(config: &Value) -> String {
        config
            .get("context")
            .and_then(Value::as_str)
            .unwrap_or(".")
            .to_string()
    }

    fn registry(config: &Value) -> Option<String> {
        config
            .get("registry")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[async_trait]
impl BackendProvider for DockerBackend {
    fn id(&self) -> &'static str {
        "docker"
    }

    fn plan(&self, config: &Value) -> Result<Vec<ProviderStep>> {
        let dockerfile = Self::dockerfile(config);
        let context = Self::context_dir(config);
        let mut steps = vec![
            ProviderStep::new(
                "docker-build",
                format!("Build image from {dockerfile} with context {context}"),
            ),
            ProviderStep::new("docker-tag", "Tag image as <project>:<version>"),
        ];
        if let Some(registry) = Self::registry(config) {
            steps.push(ProviderStep::new(
                "docker-push",
                format!("Push image to {registry}"),
            ));
        }
        Ok(steps)
    }

    async fn build(&self, request: &BuildRequest) -> Result<String> {
        if request.dry_run {
            tracing::info!(image = %request.image, "dry-run: skipping docker build");
            return Ok(request.image.clone());
        }
        let runner = DockerRunner::new()?;
        runner
            .build(
                &request.workdir,
                &Self::dockerfile(&request.config),
                &Self::context_dir(&request.config),
                &request.image,
            )
            .await?;
        Ok(request.image.clone())
    }

    async fn push(&self, image: &str, config: &Value) -> Result<()> {
        let runner = DockerRunner::new()?;
        let target = match Self::registry(config) {
            Some(registry) => {
                let target = format!("{registry}/{image}");
                runner
                    .tag(image, &target)
                    .await
                    .context("tagging image for registry")?;
                target
            }
            None => image.to_string(),
        };
        runner.push(&target).await
    }

    fn compose_service(&self, image: &str, config: &Value) -> Result<ComposeService> {
        let mut service = ComposeService::new(image);
        if let Some(port) = config.get("port").and_then(Value::as_u64) {
            service.ports.push(format!("{port}:{port}"));
        }
        if let Some(env) = config.get("environment").and_then(Value::as_object) {
            service.environment = env
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect::<BTreeMap<_, _>>();
        }
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_is_pure_and_stable() {
        let config = json!({"dockerfile": "build/Dockerfile", "context": "."});
        let first = DockerBackend.plan(&config).unwrap();
        let second = DockerBackend.plan(&config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first[0].description.contains("build/Dockerfile"));
    }

    #[test]
    fn test_plan_adds_push_step_with_registry() {
        let config = json!({"registry": "registry.example.com"});
        let steps = DockerBackend.plan(&config).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].name, "docker-push");
    }

    #[tokio::test]
    async fn test_dry_run_build_returns_image_without_docker() {
        let request = BuildRequest {
            workdir: PathBuf::from("."),
            image: "test-app:1.0.0".to_string(),
            config: Value::Null,
            dry_run: true,
        };
        let image = DockerBackend.build(&request).await.unwrap();
        assert_eq!(image, "test-app:1.0.0");
    }

    #[test]
    fn test_compose_service_maps_port() {
        let config = json!({"port": 3000});
        let service = DockerBackend
            .compose_service("test-app:1.0.0", &config)
            .unwrap();
        assert_eq!(service.ports, vec!["3000:3000"]);
    }
}
