//! Rollback command.
//!
//! Rollback is a command on top of the phase engine, not a separate
//! engine: resolve the target release, validate it is fully deployed
//! and not current, then create a fresh release carrying the
//! target's version and commit SHA and run the normal six-phase
//! pipeline against it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;

use crate::domain::plan::META_VERSION;
use crate::domain::release::{PhaseStatus, Release, CANONICAL_PHASES};
use crate::engine::{self, PhaseContext, PhaseFns};
use crate::error::ValidationError;
use crate::planner;
use crate::store::ReleaseStore;
use crate::ui;

use super::GlobalOpts;

/// Which flag selected the rollback target.
#[derive(Debug)]
pub enum RollbackTarget {
    Previous,
    Release(String),
    Version(String),
}

impl RollbackTarget {
    /// Exactly one of the three flags must be present.
    pub fn from_flags(
        to_previous: bool,
        to_release: Option<String>,
        to_version: Option<String>,
    ) -> Result<Self, ValidationError> {
        let selected =
            usize::from(to_previous) + usize::from(to_release.is_some()) + usize::from(to_version.is_some());
        match selected {
            0 => Err(ValidationError::RollbackTargetMissing),
            1 => Ok(if to_previous {
                Self::Previous
            } else if let Some(id) = to_release {
                Self::Release(id)
            } else {
                Self::Version(to_version.expect("one flag selected"))
            }),
            _ => Err(ValidationError::RollbackTargetConflict),
        }
    }
}

pub async fn execute(
    opts: &GlobalOpts,
    to_previous: bool,
    to_release: Option<String>,
    to_version: Option<String>,
) -> Result<()> {
    let workdir = opts.workdir()?;
    let store = ReleaseStore::open(&workdir)?;
    let target = RollbackTarget::from_flags(to_previous, to_release, to_version)?;
    run_rollback(opts, &workdir, &store, target, &PhaseFns::canonical()).await
}

pub(crate) async fn run_rollback(
    opts: &GlobalOpts,
    workdir: &Path,
    store: &ReleaseStore,
    target: RollbackTarget,
    fns: &PhaseFns,
) -> Result<()> {
    let config = Arc::new(opts.load_config()?);
    config.environment(&opts.env)?;

    let target = resolve_target(store, &opts.env, target)?;
    validate_target(store, &opts.env, &target)?;

    println!(
        "Rolling back '{}' to {} (version {})",
        opts.env,
        target.id.cyan(),
        target.version.yellow()
    );

    if opts.dry_run {
        ui::print_info(&format!(
            "dry-run: would create a new release carrying version {} and run the pipeline",
            target.version
        ));
        return Ok(());
    }

    let release = store.create_release(&opts.env, &target.version, &target.commit_sha)?;
    println!("   release {}", release.id.cyan());

    let mut plan = match planner::plan(&config, &opts.env) {
        Ok(plan) => plan,
        Err(e) => {
            engine::mark_all_failed(store, &release.id);
            return Err(e.context("generating deployment plan"));
        }
    };
    plan.metadata
        .insert(META_VERSION.to_string(), json!(target.version));

    let ctx = PhaseContext::new(
        Arc::clone(&config),
        opts.env.clone(),
        target.version.clone(),
        target.commit_sha.clone(),
        workdir.to_path_buf(),
        false,
    );
    engine::run(store, &release.id, &mut plan, &ctx, fns).await?;

    ui::print_success(&format!(
        "Rolled back '{}' to version {} ({})",
        opts.env, target.version, release.id
    ));
    Ok(())
}

/// Resolve the flag selection to a concrete release record.
fn resolve_target(
    store: &ReleaseStore,
    environment: &str,
    target: RollbackTarget,
) -> Result<Release> {
    match target {
        RollbackTarget::Previous => {
            let current = store
                .get_current_release(environment)
                .context("resolving rollback target")?;
            if current.previous_id.is_empty() {
                return Err(ValidationError::NoPreviousRelease {
                    environment: environment.to_string(),
                }
                .into());
            }
            store.get_release(&current.previous_id)
        }
        RollbackTarget::Release(id) => {
            let release = store.get_release(&id)?;
            if release.environment != environment {
                return Err(ValidationError::ReleaseEnvironmentMismatch {
                    id,
                    actual: release.environment,
                    requested: environment.to_string(),
                }
                .into());
            }
            Ok(release)
        }
        RollbackTarget::Version(version) => store
            .list_releases(environment)
            .into_iter()
            .find(|r| r.version == version)
            .ok_or_else(|| {
                ValidationError::NoReleaseForVersion {
                    version,
                    environment: environment.to_string(),
                }
                .into()
            }),
    }
}

/// A rollback target must not be the current release and must be
/// fully deployed.
fn validate_target(store: &ReleaseStore, environment: &str, target: &Release) -> Result<()> {
    if let Ok(current) = store.get_current_release(environment) {
        if current.id == target.id {
            return Err(ValidationError::RollbackTargetIsCurrent {
                id: target.id.clone(),
                environment: environment.to_string(),
            }
            .into());
        }
    }
    for phase in CANONICAL_PHASES {
        let status = target.phase_status(phase);
        if status != PhaseStatus::Completed {
            return Err(ValidationError::RollbackTargetIncomplete {
                id: target.id.clone(),
                phase,
                status,
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::deploy::tests::all_ok;
    use crate::commands::testutil::{opts, write_config, STAGING_YAML};
    use crate::domain::release::Phase;
    use crate::providers;

    fn fixture() -> (tempfile::TempDir, GlobalOpts, ReleaseStore) {
        providers::register_builtins();
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), STAGING_YAML);
        let store = ReleaseStore::open_at(dir.path().join("releases.json")).unwrap();
        let opts = opts(dir.path(), "staging", false);
        (dir, opts, store)
    }

    fn complete_all(store: &ReleaseStore, id: &str) {
        for phase in CANONICAL_PHASES {
            store.update_phase(id, phase, PhaseStatus::Running).unwrap();
            store
                .update_phase(id, phase, PhaseStatus::Completed)
                .unwrap();
        }
    }

    #[test]
    fn test_target_flag_validation() {
        assert!(matches!(
            RollbackTarget::from_flags(false, None, None),
            Err(ValidationError::RollbackTargetMissing)
        ));
        assert!(matches!(
            RollbackTarget::from_flags(true, Some("rel-1".into()), None),
            Err(ValidationError::RollbackTargetConflict)
        ));
        assert!(RollbackTarget::from_flags(true, None, None).is_ok());
    }

    #[test]
    fn test_two_flags_message() {
        let err =
            RollbackTarget::from_flags(false, Some("rel-1".into()), Some("1.0".into()))
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "only one rollback target flag may be specified"
        );
    }

    #[tokio::test]
    async fn test_rollback_to_previous_creates_new_release() {
        let (dir, opts, store) = fixture();

        let first = store.create_release("staging", "1.0.0", "sha-1").unwrap();
        complete_all(&store, &first.id);
        let second = store.create_release("staging", "1.1.0", "sha-2").unwrap();
        complete_all(&store, &second.id);

        run_rollback(
            &opts,
            dir.path(),
            &store,
            RollbackTarget::Previous,
            &all_ok(),
        )
        .await
        .unwrap();

        let listed = store.list_releases("staging");
        assert_eq!(listed.len(), 3);
        // Newest release carries the rollback target's identity.
        assert_eq!(listed[0].version, "1.0.0");
        assert_eq!(listed[0].commit_sha, "sha-1");
        assert!(listed[0].is_fully_deployed());
        // And is now the current release.
        assert_eq!(
            store.get_current_release("staging").unwrap().id,
            listed[0].id
        );
    }

    #[tokio::test]
    async fn test_dry_run_validates_without_creating() {
        let (dir, mut opts, store) = fixture();
        opts.dry_run = true;

        let first = store.create_release("staging", "1.0.0", "").unwrap();
        complete_all(&store, &first.id);
        let second = store.create_release("staging", "1.1.0", "").unwrap();
        complete_all(&store, &second.id);

        run_rollback(
            &opts,
            dir.path(),
            &store,
            RollbackTarget::Previous,
            &all_ok(),
        )
        .await
        .unwrap();

        assert_eq!(store.list_releases("staging").len(), 2);
    }

    #[tokio::test]
    async fn test_rollback_refuses_current_release() {
        let (dir, opts, store) = fixture();
        let only = store.create_release("staging", "1.0.0", "").unwrap();
        complete_all(&store, &only.id);

        let err = run_rollback(
            &opts,
            dir.path(),
            &store,
            RollbackTarget::Release(only.id.clone()),
            &all_ok(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("already the current release"));
    }

    #[tokio::test]
    async fn test_rollback_refuses_partially_deployed_target() {
        let (dir, opts, store) = fixture();
        let first = store.create_release("staging", "1.0.0", "").unwrap();
        complete_all(&store, &first.id);
        let broken = store.create_release("staging", "1.1.0", "").unwrap();
        store
            .update_phase(&broken.id, Phase::Build, PhaseStatus::Running)
            .unwrap();
        store
            .update_phase(&broken.id, Phase::Build, PhaseStatus::Failed)
            .unwrap();

        let err = run_rollback(
            &opts,
            dir.path(),
            &store,
            RollbackTarget::Release(broken.id.clone()),
            &all_ok(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not fully deployed"));
    }

    #[tokio::test]
    async fn test_to_previous_fails_without_previous() {
        let (dir, opts, store) = fixture();
        let only = store.create_release("staging", "1.0.0", "").unwrap();
        complete_all(&store, &only.id);

        let err = run_rollback(
            &opts,
            dir.path(),
            &store,
            RollbackTarget::Previous,
            &all_ok(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no previous release"));
    }

    #[tokio::test]
    async fn test_to_release_rejects_other_environment() {
        let (dir, opts, store) = fixture();
        let other = store.create_release("prod", "1.0.0", "").unwrap();
        complete_all(&store, &other.id);

        let err = run_rollback(
            &opts,
            dir.path(),
            &store,
            RollbackTarget::Release(other.id.clone()),
            &all_ok(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("belongs to environment 'prod'"));
    }

    #[tokio::test]
    async fn test_to_version_picks_most_recent_match() {
        let (dir, opts, store) = fixture();
        let old = store.create_release("staging", "1.0.0", "sha-old").unwrap();
        complete_all(&store, &old.id);
        let newer = store.create_release("staging", "1.0.0", "sha-new").unwrap();
        complete_all(&store, &newer.id);
        let current = store.create_release("staging", "2.0.0", "").unwrap();
        complete_all(&store, &current.id);

        run_rollback(
            &opts,
            dir.path(),
            &store,
            RollbackTarget::Version("1.0.0".to_string()),
            &all_ok(),
        )
        .await
        .unwrap();

        let listed = store.list_releases("staging");
        assert_eq!(listed[0].commit_sha, "sha-new");
    }
}
