//! Per-host execution plans
//!
//! A [`HostPlan`] is the lowering of a deployment plan onto one host:
//! a strictly-typed, densely indexed sequence of steps with opaque
//! action inputs. The JSON schema is strict: unknown top-level
//! fields are rejected so an agent never silently ignores work it
//! does not understand.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlanError;

/// Schema version accepted by this binary.
pub const HOSTPLAN_SCHEMA_VERSION: &str = "v1";

/// Closed set of actions a host step may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Build,
    Migrate,
    ApplyCompose,
    HealthCheck,
    RenderCompose,
    Rollout,
}

impl StepAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Migrate => "migrate",
            Self::ApplyCompose => "apply_compose",
            Self::HealthCheck => "health_check",
            Self::RenderCompose => "render_compose",
            Self::Rollout => "rollout",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The resource a step operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub provider: String,
}

/// A host identity: the target of a host plan and the unit the
/// bootstrap engine fans out over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Host {
    pub logical_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Host {
    /// Display name: the host name when set, otherwise the logical id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.logical_id
        } else {
            &self.name
        }
    }
}

/// One unit of host work. `inputs` is opaque to everything but the
/// action executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostStep {
    pub id: String,
    pub index: u32,
    pub action: StepAction,
    pub resource: ResourceRef,
    #[serde(default)]
    pub inputs: Value,
}

/// A plan lowered onto a specific host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostPlan {
    pub schema_version: String,
    pub plan_id: String,
    pub host: Host,
    pub steps: Vec<HostStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_steps: Vec<HostStep>,
}

impl HostPlan {
    /// Strict deserialization: serde rejects unknown top-level fields,
    /// and this additionally rejects empty host ids, unsupported
    /// schema versions and non-dense step indices.
    pub fn from_json(data: &str) -> anyhow::Result<HostPlan> {
        let plan: HostPlan = serde_json::from_str(data)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.schema_version != HOSTPLAN_SCHEMA_VERSION {
            anyhow::bail!(
                "unsupported host plan schema version '{}' (expected '{}')",
                self.schema_version,
                HOSTPLAN_SCHEMA_VERSION
            );
        }
        if self.host.logical_id.is_empty() {
            anyhow::bail!("host plan has an empty host.logical_id");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.index as usize != i {
                anyhow::bail!(
                    "host plan step '{}' has index {} (expected {})",
                    step.id,
                    step.index,
                    i
                );
            }
        }
        Ok(())
    }
}

/// An engine-level plan: operations lowered to steps with explicit
/// host attribution. Steps with no hosts are global (registry push,
/// image build).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnginePlan {
    pub plan_id: String,
    pub environment: String,
    pub steps: Vec<EngineStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineStep {
    pub id: String,
    pub action: StepAction,
    pub resource: ResourceRef,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub inputs: Value,
}

impl EngineStep {
    pub fn is_global(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl EnginePlan {
    pub fn from_json(data: &str) -> anyhow::Result<EnginePlan> {
        Ok(serde_json::from_str(data)?)
    }

    /// Every host id referenced by any step must be non-empty.
    pub fn validate_hosts(&self) -> Result<(), PlanError> {
        for step in &self.steps {
            if step.hosts.iter().any(String::is_empty) {
                return Err(PlanError::EmptyHostId {
                    step: step.id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_hostplan() -> HostPlan {
        HostPlan {
            schema_version: HOSTPLAN_SCHEMA_VERSION.to_string(),
            plan_id: "plan-staging-1.0.0".to_string(),
            host: Host {
                logical_id: "web-1".to_string(),
                name: "web-1.example.com".to_string(),
                role: "web".to_string(),
                public_ip: "203.0.113.7".to_string(),
                tags: vec!["staging".to_string()],
            },
            steps: vec![
                HostStep {
                    id: "render-web-1".to_string(),
                    index: 0,
                    action: StepAction::RenderCompose,
                    resource: ResourceRef {
                        kind: "compose".to_string(),
                        name: "app".to_string(),
                        provider: String::new(),
                    },
                    inputs: json!({"services": ["backend"]}),
                },
                HostStep {
                    id: "apply-web-1".to_string(),
                    index: 1,
                    action: StepAction::ApplyCompose,
                    resource: ResourceRef {
                        kind: "compose".to_string(),
                        name: "app".to_string(),
                        provider: String::new(),
                    },
                    inputs: Value::Null,
                },
            ],
            global_steps: Vec::new(),
        }
    }

    #[test]
    fn test_roundtrip() {
        let plan = sample_hostplan();
        let json = plan.to_json().unwrap();
        let parsed = HostPlan::from_json(&json).unwrap();
        assert_eq!(plan, parsed);
    }

    #[test]
    fn test_unknown_top_level_field_rejected() {
        let mut value: Value = serde_json::to_value(sample_hostplan()).unwrap();
        value["unknown_field"] = json!("x");
        let data = serde_json::to_string(&value).unwrap();
        assert!(HostPlan::from_json(&data).is_err());
    }

    #[test]
    fn test_empty_logical_id_rejected() {
        let mut plan = sample_hostplan();
        plan.host.logical_id.clear();
        let data = serde_json::to_string(&plan).unwrap();
        let err = HostPlan::from_json(&data).unwrap_err();
        assert!(err.to_string().contains("logical_id"));
    }

    #[test]
    fn test_sparse_indices_rejected() {
        let mut plan = sample_hostplan();
        plan.steps[1].index = 3;
        let data = serde_json::to_string(&plan).unwrap();
        assert!(HostPlan::from_json(&data).is_err());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let mut value: Value = serde_json::to_value(sample_hostplan()).unwrap();
        value["steps"][0]["action"] = json!("reboot");
        let data = serde_json::to_string(&value).unwrap();
        assert!(HostPlan::from_json(&data).is_err());
    }

    #[test]
    fn test_unsupported_schema_version_rejected() {
        let mut plan = sample_hostplan();
        plan.schema_version = "v9".to_string();
        let data = serde_json::to_string(&plan).unwrap();
        assert!(HostPlan::from_json(&data).is_err());
    }
}
