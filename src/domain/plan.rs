//! Deployment plans
//!
//! A [`Plan`] is a canonical, ordered, side-effect-free description of
//! the work for one environment. Plans carry no timestamps and no
//! randomness: planning the same configuration twice yields an equal
//! plan.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlanError;

/// Metadata key under which the build phase records the image it
/// produced, read later by push and rollout.
pub const META_BUILT_IMAGE: &str = "built_image";
/// Metadata key for the requested version.
pub const META_VERSION: &str = "version";
/// Metadata key for provider sub-plans, keyed by provider id.
pub const META_PROVIDER_PLANS: &str = "provider_plans";

/// Operation kinds a planner may emit, in declared phase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Build,
    Push,
    MigratePre,
    Rollout,
    HealthCheck,
    MigratePost,
    Finalize,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Push => "push",
            Self::MigratePre => "migrate_pre",
            Self::Rollout => "rollout",
            Self::HealthCheck => "health_check",
            Self::MigratePost => "migrate_post",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single unit of planned work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub description: String,
    /// Ids of operations this one depends on. Always earlier in the
    /// plan sequence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Operation {
    pub fn new(kind: OpKind, id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
            description: description.into(),
            depends_on: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_deps(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    fn meta_strings(&self, key: &str) -> Vec<String> {
        self.metadata
            .get(key)
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Services this operation is attributed to.
    pub fn services(&self) -> Vec<String> {
        self.meta_strings("services")
    }

    /// Hosts this operation is attributed to. Empty means global.
    pub fn hosts(&self) -> Vec<String> {
        self.meta_strings("hosts")
    }

    /// Host roles this operation is attributed to.
    pub fn roles(&self) -> Vec<String> {
        self.meta_strings("roles")
    }
}

/// The work for one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub environment: String,
    pub operations: Vec<Operation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Plan {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            operations: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn version(&self) -> &str {
        self.metadata
            .get(META_VERSION)
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    /// Checks the dependency rule: every `depends_on` id refers to an
    /// operation earlier in the sequence and ids are unique. The
    /// planner never emits a plan that fails this.
    pub fn validate_order(&self) -> Result<(), PlanError> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for op in &self.operations {
            let op_id = op.id.as_deref().unwrap_or("");
            for dep in &op.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(PlanError::ForwardDependency {
                        id: op_id.to_string(),
                        dep: dep.clone(),
                    });
                }
            }
            if let Some(id) = op.id.as_deref() {
                if !seen.insert(id) {
                    return Err(PlanError::DuplicateOperation { id: id.to_string() });
                }
            }
        }
        Ok(())
    }

    /// Keep only operations matching the requested services.
    /// Operations with no service attribution are retained.
    pub fn filter_services(&self, services: &[String]) -> Result<Plan, PlanError> {
        self.filter_by("service", services, |op| op.services())
    }

    /// Keep only operations matching the requested hosts. Global
    /// operations are retained.
    pub fn filter_hosts(&self, hosts: &[String]) -> Result<Plan, PlanError> {
        self.filter_by("host", hosts, |op| op.hosts())
    }

    /// Keep only operations matching the requested host roles.
    pub fn filter_roles(&self, roles: &[String]) -> Result<Plan, PlanError> {
        self.filter_by("role", roles, |op| op.roles())
    }

    fn filter_by(
        &self,
        kind: &'static str,
        requested: &[String],
        attribution: impl Fn(&Operation) -> Vec<String>,
    ) -> Result<Plan, PlanError> {
        if requested.is_empty() {
            return Ok(self.clone());
        }

        let known: BTreeSet<String> = self
            .operations
            .iter()
            .flat_map(|op| attribution(op))
            .collect();
        for value in requested {
            if !known.contains(value) {
                return Err(PlanError::FilterUnmatched {
                    kind,
                    value: value.clone(),
                    available: known.iter().cloned().collect::<Vec<_>>().join(", "),
                });
            }
        }

        let mut filtered = self.clone();
        filtered.operations.retain(|op| {
            let attributed = attribution(op);
            attributed.is_empty() || attributed.iter().any(|a| requested.contains(a))
        });
        // Filtered-out operations must not linger in dependency lists.
        let kept: BTreeSet<String> = filtered
            .operations
            .iter()
            .filter_map(|op| op.id.clone())
            .collect();
        for op in &mut filtered.operations {
            op.depends_on.retain(|dep| kept.contains(dep));
        }
        Ok(filtered)
    }
}
