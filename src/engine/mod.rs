//! Phase engine
//!
//! Drives a release through the fixed six-phase pipeline:
//! build -> push -> migrate_pre -> rollout -> migrate_post ->
//! finalize. The store is updated before and after every phase, and
//! a failure marks every downstream phase skipped before the engine
//! returns. The [`PhaseFns`] record is the engine's only extension
//! point: tests inject alternative phase functions without touching
//! any global state.

pub mod phases;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::Config;
use crate::domain::plan::Plan;
use crate::domain::release::{Phase, PhaseStatus, CANONICAL_PHASES};
use crate::error::ExecutionError;
use crate::store::ReleaseStore;

/// Everything a phase function may consult. Owned values so phase
/// futures borrow only the context itself.
pub struct PhaseContext {
    pub config: Arc<Config>,
    pub environment: String,
    pub version: String,
    pub commit_sha: String,
    pub workdir: PathBuf,
    pub dry_run: bool,
    cancel: Arc<AtomicBool>,
}

impl PhaseContext {
    pub fn new(
        config: Arc<Config>,
        environment: impl Into<String>,
        version: impl Into<String>,
        commit_sha: impl Into<String>,
        workdir: PathBuf,
        dry_run: bool,
    ) -> Self {
        Self {
            config,
            environment: environment.into(),
            version: version.into(),
            commit_sha: commit_sha.into(),
            workdir,
            dry_run,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for signalling cancellation from outside the pipeline.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// A phase function's future, borrowing the context and the plan for
/// the duration of the phase.
pub type PhaseFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// One phase implementation. Phase functions thread values to later
/// phases only through `plan.metadata`.
pub type PhaseFn =
    Box<dyn for<'a> Fn(&'a PhaseContext, &'a mut Plan) -> PhaseFuture<'a> + Send + Sync>;

/// The record of six phase functions the engine executes.
pub struct PhaseFns {
    pub build: PhaseFn,
    pub push: PhaseFn,
    pub migrate_pre: PhaseFn,
    pub rollout: PhaseFn,
    pub migrate_post: PhaseFn,
    pub finalize: PhaseFn,
}

impl PhaseFns {
    /// The canonical production implementations.
    pub fn canonical() -> Self {
        Self {
            build: Box::new(phases::build),
            push: Box::new(phases::push),
            migrate_pre: Box::new(phases::migrate_pre),
            rollout: Box::new(phases::rollout),
            migrate_post: Box::new(phases::migrate_post),
            finalize: Box::new(phases::finalize),
        }
    }

    pub fn get(&self, phase: Phase) -> &PhaseFn {
        match phase {
            Phase::Build => &self.build,
            Phase::Push => &self.push,
            Phase::MigratePre => &self.migrate_pre,
            Phase::Rollout => &self.rollout,
            Phase::MigratePost => &self.migrate_post,
            Phase::Finalize => &self.finalize,
        }
    }
}

/// Run the six-phase pipeline against a release.
///
/// Each phase is marked running before its function is invoked and
/// completed after it returns. On failure the phase is marked
/// failed, every later phase still pending or running is marked
/// skipped, and the returned error names the failing phase and wraps
/// the cause. A store write failure after a successful phase
/// terminates the pipeline with that error.
pub async fn run(
    store: &ReleaseStore,
    release_id: &str,
    plan: &mut Plan,
    ctx: &PhaseContext,
    fns: &PhaseFns,
) -> Result<()> {
    for (position, phase) in CANONICAL_PHASES.iter().enumerate() {
        let phase = *phase;
        store.update_phase(release_id, phase, PhaseStatus::Running)?;
        tracing::info!(release_id, phase = %phase, "phase started");

        let outcome = if ctx.is_cancelled() {
            Err(anyhow!(ExecutionError::Cancelled))
        } else {
            (fns.get(phase))(ctx, plan).await
        };

        match outcome {
            Ok(()) => {
                store.update_phase(release_id, phase, PhaseStatus::Completed)?;
                tracing::info!(release_id, phase = %phase, "phase completed");
            }
            Err(cause) => {
                store.update_phase(release_id, phase, PhaseStatus::Failed)?;
                skip_downstream(store, release_id, position);
                tracing::error!(release_id, phase = %phase, error = %cause, "phase failed");
                return Err(anyhow!(ExecutionError::PhaseFailed {
                    phase,
                    source: cause.into(),
                }));
            }
        }
    }
    Ok(())
}

/// Mark every phase after `failed_position` that is still pending or
/// running as skipped. Write failures here are logged, not raised;
/// the phase error is what the caller gets back.
fn skip_downstream(store: &ReleaseStore, release_id: &str, failed_position: usize) {
    let release = match store.get_release(release_id) {
        Ok(release) => release,
        Err(e) => {
            tracing::warn!(release_id, error = %e, "could not load release to skip downstream phases");
            return;
        }
    };
    for phase in &CANONICAL_PHASES[failed_position + 1..] {
        let status = release.phase_status(*phase);
        if matches!(status, PhaseStatus::Pending | PhaseStatus::Running) {
            if let Err(e) = store.update_phase(release_id, *phase, PhaseStatus::Skipped) {
                tracing::warn!(release_id, phase = %phase, error = %e, "failed to mark phase skipped");
            }
        }
    }
}

/// Mark every canonical phase failed. Used when plan generation
/// itself fails before any phase has run, so the release is left in
/// a consistent failed state. Never returns an error; individual
/// store failures are logged at debug and the sweep continues.
pub fn mark_all_failed(store: &ReleaseStore, release_id: &str) {
    for phase in CANONICAL_PHASES {
        if let Err(e) = store.update_phase(release_id, phase, PhaseStatus::Failed) {
            tracing::debug!(release_id, phase = %phase, error = %e, "failed to mark phase failed");
        }
    }
}
