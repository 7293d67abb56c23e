//! Release records and phase accounting.
//!
//! A release is a single deployment attempt against one environment,
//! identified by a sortable id and tracked through six phases.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Canonical deployment phases, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Build,
    Push,
    MigratePre,
    Rollout,
    MigratePost,
    Finalize,
}

/// The fixed pipeline order the engine drives.
pub const CANONICAL_PHASES: [Phase; 6] = [
    Phase::Build,
    Phase::Push,
    Phase::MigratePre,
    Phase::Rollout,
    Phase::MigratePost,
    Phase::Finalize,
];

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Push => "push",
            Self::MigratePre => "migrate_pre",
            Self::Rollout => "rollout",
            Self::MigratePost => "migrate_post",
            Self::Finalize => "finalize",
        }
    }

}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status of a single phase within a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl PhaseStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Terminal statuses are never rewritten for a release.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a phase status transition is legal.
///
/// pending -> running -> completed | failed, and pending | running ->
/// skipped. Writing the same status again is tolerated so retried
/// store updates stay idempotent.
pub fn transition_allowed(from: PhaseStatus, to: PhaseStatus) -> bool {
    use PhaseStatus::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Pending, Running)
            | (Pending, Failed)
            | (Pending, Skipped)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Skipped)
    )
}

/// Durable record of one deployment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub environment: String,
    pub version: String,
    #[serde(default)]
    pub commit_sha: String,
    pub created_at: String,
    /// Id of the release that was current when this one was created;
    /// empty for the first release in an environment.
    #[serde(default)]
    pub previous_id: String,
    pub phases: BTreeMap<Phase, PhaseStatus>,
}

impl Release {
    /// New release with every canonical phase pending.
    pub fn new(
        id: impl Into<String>,
        environment: impl Into<String>,
        version: impl Into<String>,
        commit_sha: impl Into<String>,
        previous_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let phases = CANONICAL_PHASES
            .iter()
            .map(|p| (*p, PhaseStatus::Pending))
            .collect();
        Self {
            id: id.into(),
            environment: environment.into(),
            version: version.into(),
            commit_sha: commit_sha.into(),
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            previous_id: previous_id.into(),
            phases,
        }
    }

    pub fn phase_status(&self, phase: Phase) -> PhaseStatus {
        self.phases.get(&phase).copied().unwrap_or(PhaseStatus::Pending)
    }

    /// Every canonical phase completed. Required for rollback targets.
    pub fn is_fully_deployed(&self) -> bool {
        CANONICAL_PHASES
            .iter()
            .all(|p| self.phase_status(*p) == PhaseStatus::Completed)
    }

    /// Finalize completed: this release counts for current-release
    /// resolution.
    pub fn is_finalized(&self) -> bool {
        self.phase_status(Phase::Finalize) == PhaseStatus::Completed
    }

    /// One-word status for listings.
    pub fn overall_status(&self) -> &'static str {
        if self.is_fully_deployed() {
            "completed"
        } else if CANONICAL_PHASES
            .iter()
            .any(|p| self.phase_status(*p) == PhaseStatus::Failed)
        {
            "failed"
        } else if CANONICAL_PHASES
            .iter()
            .any(|p| self.phase_status(*p) != PhaseStatus::Pending)
        {
            "in_progress"
        } else {
            "pending"
        }
    }
}

static RELEASE_SEQ: AtomicU32 = AtomicU32::new(0);

/// Allocate a release id that sorts lexicographically in creation
/// order: a millisecond timestamp prefix plus a per-process sequence
/// suffix to disambiguate ids minted within the same millisecond.
pub fn next_release_id(now: DateTime<Utc>) -> String {
    let seq = RELEASE_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("rel-{}-{:03}", now.format("%Y%m%d-%H%M%S%3f"), seq)
}
