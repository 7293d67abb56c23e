//! Property-based tests for stagecraft invariants.
//!
//! These verify properties that should hold for all inputs:
//! - Plan determinism: equal inputs produce equal plans
//! - Phase accounting: failures mark exactly the downstream phases
//! - Current-release derivation from the finalize phase
//! - Listing order: strictly descending by id, stable across reads
//! - Bootstrap result order mirrors the input host list
//! - HostPlan strict serialization round-trips

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::Value;

    use crate::bootstrap::{BootstrapEngine, BootstrapSettings};
    use crate::config::Config;
    use crate::domain::hostplan::{Host, HostPlan};
    use crate::domain::plan::Plan;
    use crate::domain::release::{Phase, PhaseStatus, CANONICAL_PHASES};
    use crate::engine::{self, PhaseContext, PhaseFn, PhaseFns, PhaseFuture};
    use crate::exec::NoopExecutor;
    use crate::planner;
    use crate::providers;
    use crate::store::ReleaseStore;

    // Prefixed so generated names never collide with YAML scalars
    // like `true` or `null`.
    fn project_strategy() -> impl Strategy<Value = String> {
        "p-[a-z0-9]{1,8}"
    }

    fn env_strategy() -> impl Strategy<Value = String> {
        "e-[a-z0-9]{1,8}"
    }

    fn host_ids_strategy() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::btree_set("h-[a-z0-9]{1,6}", 0..5)
            .prop_map(|set| set.into_iter().collect())
    }

    fn config_from(project: &str, envs: &[String], hosts: &[String]) -> Config {
        providers::register_builtins();
        let mut yaml = format!("project:\n  name: {project}\nbackend:\n  provider: docker\nenvironments:\n");
        for env in envs {
            yaml.push_str(&format!("  {env}:\n    driver: local\n"));
            if !hosts.is_empty() {
                yaml.push_str("    hosts:\n");
                for host in hosts {
                    yaml.push_str(&format!("      - id: {host}\n        role: web\n"));
                }
            }
        }
        Config::from_yaml(&yaml).unwrap()
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn ok_phase<'a>(_: &'a PhaseContext, _: &'a mut Plan) -> PhaseFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    fn failing_phase<'a>(_: &'a PhaseContext, _: &'a mut Plan) -> PhaseFuture<'a> {
        Box::pin(async { Err(anyhow::anyhow!("injected failure")) })
    }

    /// Phase record failing at exactly one canonical position.
    fn fns_failing_at(position: usize) -> PhaseFns {
        let pick = |i: usize| -> PhaseFn {
            if i == position {
                Box::new(failing_phase)
            } else {
                Box::new(ok_phase)
            }
        };
        PhaseFns {
            build: pick(0),
            push: pick(1),
            migrate_pre: pick(2),
            rollout: pick(3),
            migrate_post: pick(4),
            finalize: pick(5),
        }
    }

    proptest! {
        /// Property 1: planning is deterministic across invocations.
        #[test]
        fn plan_is_deterministic(
            project in project_strategy(),
            env in env_strategy(),
            hosts in host_ids_strategy(),
        ) {
            let config = config_from(&project, std::slice::from_ref(&env), &hosts);
            let first = planner::plan(&config, &env).unwrap();
            let second = planner::plan(&config, &env).unwrap();

            prop_assert_eq!(first.operations.len(), second.operations.len());
            for (a, b) in first.operations.iter().zip(second.operations.iter()) {
                prop_assert_eq!(a.kind, b.kind);
                prop_assert_eq!(&a.description, &b.description);
                prop_assert_eq!(&a.metadata, &b.metadata);
            }
            prop_assert_eq!(first, second);
        }

        /// Property 2: a failure at phase p leaves completed before,
        /// failed at p, skipped after.
        #[test]
        fn failure_accounting_is_exact(position in 0usize..6) {
            let config = config_from("prop-app", &["staging".to_string()], &[]);
            let dir = tempfile::tempdir().unwrap();
            let store = ReleaseStore::open_at(dir.path().join("releases.json")).unwrap();
            let release = store.create_release("staging", "1.0.0", "").unwrap();
            let ctx = PhaseContext::new(
                Arc::new(config),
                "staging",
                "1.0.0",
                "",
                dir.path().to_path_buf(),
                false,
            );
            let mut plan = Plan::new("staging");

            let result = runtime().block_on(engine::run(
                &store,
                &release.id,
                &mut plan,
                &ctx,
                &fns_failing_at(position),
            ));
            prop_assert!(result.is_err());

            let after = store.get_release(&release.id).unwrap();
            for (i, phase) in CANONICAL_PHASES.iter().enumerate() {
                let expected = match i.cmp(&position) {
                    std::cmp::Ordering::Less => PhaseStatus::Completed,
                    std::cmp::Ordering::Equal => PhaseStatus::Failed,
                    std::cmp::Ordering::Greater => PhaseStatus::Skipped,
                };
                prop_assert_eq!(after.phase_status(*phase), expected);
            }
        }

        /// Property 3: a release is current iff its finalize phase
        /// completed.
        #[test]
        fn current_release_tracks_finalize(finalized in proptest::collection::vec(any::<bool>(), 1..6)) {
            let dir = tempfile::tempdir().unwrap();
            let store = ReleaseStore::open_at(dir.path().join("releases.json")).unwrap();

            let mut expected_current: Option<String> = None;
            for (i, finalize) in finalized.iter().enumerate() {
                let release = store
                    .create_release("staging", &format!("1.0.{i}"), "")
                    .unwrap();
                if *finalize {
                    for phase in CANONICAL_PHASES {
                        store.update_phase(&release.id, phase, PhaseStatus::Running).unwrap();
                        store.update_phase(&release.id, phase, PhaseStatus::Completed).unwrap();
                    }
                    expected_current = Some(release.id.clone());
                    let current = store.get_current_release("staging").unwrap();
                    prop_assert_eq!(&current.id, &release.id);
                } else {
                    store.update_phase(&release.id, Phase::Build, PhaseStatus::Running).unwrap();
                    store.update_phase(&release.id, Phase::Build, PhaseStatus::Failed).unwrap();
                }
            }

            match expected_current {
                Some(id) => {
                    prop_assert_eq!(store.get_current_release("staging").unwrap().id, id);
                }
                None => prop_assert!(store.get_current_release("staging").is_err()),
            }
        }

        /// Property 4: listings sort strictly descending by id and
        /// are stable across reads.
        #[test]
        fn listing_is_sorted_and_stable(count in 1usize..8) {
            let dir = tempfile::tempdir().unwrap();
            let store = ReleaseStore::open_at(dir.path().join("releases.json")).unwrap();
            for i in 0..count {
                store.create_release("staging", &format!("1.0.{i}"), "").unwrap();
            }

            let first = store.list_releases("staging");
            let second = store.list_releases("staging");
            prop_assert_eq!(first.len(), count);
            for window in first.windows(2) {
                prop_assert!(window[0].id > window[1].id);
            }
            prop_assert_eq!(first, second);
        }

        /// Property 5: bootstrap results mirror the input host order
        /// regardless of completion timing.
        #[test]
        fn bootstrap_preserves_input_order(ids in proptest::collection::vec("[a-z][a-z0-9]{0,6}", 0..6)) {
            let hosts: Vec<Host> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| Host {
                    // Suffix with the position so duplicate names stay distinct.
                    logical_id: format!("{id}-{i}"),
                    name: String::new(),
                    role: "web".to_string(),
                    public_ip: String::new(),
                    tags: Vec::new(),
                })
                .collect();

            providers::register_builtins();
            let engine = BootstrapEngine::new(
                Arc::new(NoopExecutor),
                providers::networks().get("none").unwrap(),
                Value::Null,
                BootstrapSettings { ssh_user: "root".to_string() },
            );
            let result = runtime().block_on(engine.run(&hosts)).unwrap();

            prop_assert_eq!(result.hosts.len(), hosts.len());
            for (outcome, host) in result.hosts.iter().zip(hosts.iter()) {
                prop_assert_eq!(&outcome.host.logical_id, &host.logical_id);
            }
        }

        /// Property 6: HostPlan JSON round-trips, and any extra
        /// top-level field breaks strict unmarshalling.
        #[test]
        fn hostplan_roundtrip_is_strict(
            host_id in "h-[a-z0-9]{1,8}",
            extra_field in "[a-z_]{1,12}",
        ) {
            let config = config_from("prop-app", &["staging".to_string()], &[host_id.clone()]);
            let plan = planner::plan(&config, "staging").unwrap();
            let engine_plan = planner::lower(&plan).unwrap();
            let sliced = planner::slicer::slice(&engine_plan, &[]).unwrap();
            let host_plan = &sliced.host_plans[&host_id];

            let json = host_plan.to_json().unwrap();
            let parsed = HostPlan::from_json(&json).unwrap();
            prop_assert_eq!(host_plan, &parsed);

            let mut value: Value = serde_json::from_str(&json).unwrap();
            let is_known_field = matches!(
                extra_field.as_str(),
                "schema_version" | "plan_id" | "host" | "steps" | "global_steps"
            );
            prop_assume!(!is_known_field);
            value[extra_field.as_str()] = Value::String("x".to_string());
            let tampered = serde_json::to_string(&value).unwrap();
            prop_assert!(HostPlan::from_json(&tampered).is_err());
        }
    }
}
