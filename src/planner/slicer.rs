//! Plan-to-HostPlan slicer
//!
//! Groups engine steps by host id, preserving input order within
//! each group, and compacts step indices to a dense 0-based range.
//! Iteration over the resulting host plans is by sorted host id so
//! serialization is deterministic.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::domain::hostplan::{
    EnginePlan, EngineStep, Host, HostPlan, HostStep, HOSTPLAN_SCHEMA_VERSION,
};

/// The slicer's output: one plan per host plus the steps that have
/// no host attribution (image build, registry push, migrations).
#[derive(Debug, Clone, PartialEq)]
pub struct SlicedPlan {
    pub host_plans: BTreeMap<String, HostPlan>,
    pub global_steps: Vec<HostStep>,
}

impl SlicedPlan {
    pub fn host_ids(&self) -> Vec<&str> {
        self.host_plans.keys().map(String::as_str).collect()
    }
}

/// Slice an engine plan. `catalog` enriches host references with
/// name, role and address; hosts missing from it are emitted with
/// just their logical id.
pub fn slice(plan: &EnginePlan, catalog: &[Host]) -> Result<SlicedPlan> {
    plan.validate_hosts()?;

    let by_id: BTreeMap<&str, &Host> = catalog
        .iter()
        .map(|h| (h.logical_id.as_str(), h))
        .collect();

    let mut global: Vec<&EngineStep> = Vec::new();
    let mut per_host: BTreeMap<String, Vec<&EngineStep>> = BTreeMap::new();
    for step in &plan.steps {
        if step.is_global() {
            global.push(step);
        } else {
            for host in &step.hosts {
                per_host.entry(host.clone()).or_default().push(step);
            }
        }
    }

    let global_steps = compact(&global);

    let host_plans = per_host
        .into_iter()
        .map(|(logical_id, steps)| {
            let host = by_id
                .get(logical_id.as_str())
                .map(|h| (*h).clone())
                .unwrap_or_else(|| Host {
                    logical_id: logical_id.clone(),
                    name: String::new(),
                    role: String::new(),
                    public_ip: String::new(),
                    tags: Vec::new(),
                });
            let host_plan = HostPlan {
                schema_version: HOSTPLAN_SCHEMA_VERSION.to_string(),
                plan_id: plan.plan_id.clone(),
                host,
                steps: compact(&steps),
                global_steps: global_steps.clone(),
            };
            (logical_id, host_plan)
        })
        .collect();

    Ok(SlicedPlan {
        host_plans,
        global_steps,
    })
}

/// Turn engine steps into host steps with dense indices from 0.
fn compact(steps: &[&EngineStep]) -> Vec<HostStep> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| HostStep {
            id: step.id.clone(),
            index: index as u32,
            action: step.action,
            resource: step.resource.clone(),
            inputs: step.inputs.clone(),
        })
        .collect()
}
