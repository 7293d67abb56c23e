//! Frontend provider contract and the static-site implementation.

use anyhow::Result;
use serde_json::Value;

use crate::exec::compose::ComposeService;

use super::ProviderStep;

/// Contributes the frontend service to the dev topology.
pub trait FrontendProvider: Send + Sync {
    fn id(&self) -> &'static str;

    fn plan(&self, config: &Value) -> Result<Vec<ProviderStep>>;

    fn compose_service(&self, config: &Value) -> Result<ComposeService>;
}

/// Serves a built asset directory through nginx.
pub struct StaticFrontend;

impl StaticFrontend {
    fn dist_dir(config: &Value) -> String {
        config
            .get("dist")
            .and_then(Value::as_str)
            .unwrap_or("dist")
            .to_string()
    }
}

impl FrontendProvider for StaticFrontend {
    fn id(&self) -> &'static str {
        "static"
    }

    fn plan(&self, config: &Value) -> Result<Vec<ProviderStep>> {
        Ok(vec![ProviderStep::new(
            "serve-static",
            format!("Serve {} through nginx", Self::dist_dir(config)),
        )])
    }

    fn compose_service(&self, config: &Value) -> Result<ComposeService> {
        let mut service = ComposeService::new("nginx:alpine");
        service.volumes.push(format!(
            "./{}:/usr/share/nginx/html:ro",
            Self::dist_dir(config)
        ));
        if let Some(port) = config.get("port").and_then(Value::as_u64) {
            service.ports.push(format!("{port}:80"));
        }
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compose_service_mounts_dist() {
        let service = StaticFrontend
            .compose_service(&json!({"dist": "build", "port": 8080}))
            .unwrap();
        assert_eq!(service.image, "nginx:alpine");
        assert_eq!(service.volumes, vec!["./build:/usr/share/nginx/html:ro"]);
        assert_eq!(service.ports, vec!["8080:80"]);
    }
}
