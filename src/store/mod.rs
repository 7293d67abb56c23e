//! Release state store
//!
//! An append-mostly journal of every release across every
//! environment, persisted as one JSON document. Writes go through
//! write-to-temp-then-rename so readers never observe a partial
//! file. A single process mutates the file at a time; within the
//! process all access serializes through the store's mutex.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::release::{next_release_id, transition_allowed, Phase, PhaseStatus, Release};
use crate::error::{StateError, ValidationError};

/// Environment variable overriding the state file location.
pub const STATE_FILE_ENV: &str = "STAGECRAFT_STATE_FILE";
/// Default state file path, relative to the working directory.
pub const DEFAULT_STATE_PATH: &str = ".stagecraft/releases.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Journal {
    #[serde(default)]
    releases: Vec<Release>,
}

pub struct ReleaseStore {
    path: PathBuf,
    journal: Mutex<Journal>,
}

impl ReleaseStore {
    /// Open the store for a working directory, honoring the
    /// `STAGECRAFT_STATE_FILE` override.
    pub fn open(workdir: &Path) -> Result<Self> {
        let path = match std::env::var(STATE_FILE_ENV) {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => workdir.join(DEFAULT_STATE_PATH),
        };
        Self::open_at(path)
    }

    /// Open the store at an explicit path. Used by tests.
    pub fn open_at(path: PathBuf) -> Result<Self> {
        let journal = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| StateError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            serde_json::from_str(&content).map_err(|e| StateError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            Journal::default()
        };
        Ok(Self {
            path,
            journal: Mutex::new(journal),
        })
    }

    /// Allocate a release with all canonical phases pending, link it
    /// to the environment's current release, and persist.
    pub fn create_release(
        &self,
        environment: &str,
        version: &str,
        commit_sha: &str,
    ) -> Result<Release> {
        if version.is_empty() {
            return Err(ValidationError::EmptyVersion.into());
        }

        let mut journal = self.journal.lock().expect("store lock poisoned");
        let previous_id = current_of(&journal.releases, environment)
            .map(|r| r.id.clone())
            .unwrap_or_default();

        let now = Utc::now();
        let release = Release::new(
            next_release_id(now),
            environment,
            version,
            commit_sha,
            previous_id,
            now,
        );
        journal.releases.push(release.clone());
        self.persist(&journal)?;
        Ok(release)
    }

    /// Write one phase status, refusing transitions out of a
    /// terminal state.
    pub fn update_phase(&self, release_id: &str, phase: Phase, status: PhaseStatus) -> Result<()> {
        let mut journal = self.journal.lock().expect("store lock poisoned");
        let release = journal
            .releases
            .iter_mut()
            .find(|r| r.id == release_id)
            .ok_or_else(|| StateError::ReleaseNotFound {
                id: release_id.to_string(),
            })?;

        let from = release.phase_status(phase);
        if !transition_allowed(from, status) {
            return Err(StateError::IllegalTransition {
                id: release_id.to_string(),
                phase,
                from,
                to: status,
            }
            .into());
        }
        release.phases.insert(phase, status);
        self.persist(&journal)
    }

    pub fn get_release(&self, release_id: &str) -> Result<Release> {
        let journal = self.journal.lock().expect("store lock poisoned");
        journal
            .releases
            .iter()
            .find(|r| r.id == release_id)
            .cloned()
            .ok_or_else(|| {
                StateError::ReleaseNotFound {
                    id: release_id.to_string(),
                }
                .into()
            })
    }

    /// The most recent release whose finalize phase completed.
    pub fn get_current_release(&self, environment: &str) -> Result<Release> {
        let journal = self.journal.lock().expect("store lock poisoned");
        current_of(&journal.releases, environment)
            .cloned()
            .ok_or_else(|| {
                StateError::NoCurrentRelease {
                    environment: environment.to_string(),
                }
                .into()
            })
    }

    /// All releases for one environment, newest first.
    pub fn list_releases(&self, environment: &str) -> Vec<Release> {
        let journal = self.journal.lock().expect("store lock poisoned");
        let mut releases: Vec<Release> = journal
            .releases
            .iter()
            .filter(|r| r.environment == environment)
            .cloned()
            .collect();
        releases.sort_by(|a, b| b.id.cmp(&a.id));
        releases
    }

    /// All releases grouped by environment (ascending); newest first
    /// within each group.
    pub fn list_all_releases(&self) -> BTreeMap<String, Vec<Release>> {
        let journal = self.journal.lock().expect("store lock poisoned");
        let mut grouped: BTreeMap<String, Vec<Release>> = BTreeMap::new();
        for release in &journal.releases {
            grouped
                .entry(release.environment.clone())
                .or_default()
                .push(release.clone());
        }
        for releases in grouped.values_mut() {
            releases.sort_by(|a, b| b.id.cmp(&a.id));
        }
        grouped
    }

    /// Atomic replace: serialize to a temp file in the state
    /// directory, then rename over the journal.
    fn persist(&self, journal: &Journal) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent).map_err(|e| StateError::Write {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        let json = serde_json::to_string_pretty(journal).context("serializing release journal")?;
        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| StateError::Write {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.write_all(b"\n"))
            .map_err(|e| StateError::Write {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;
        temp.persist(&self.path).map_err(|e| StateError::Write {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

fn current_of<'a>(releases: &'a [Release], environment: &str) -> Option<&'a Release> {
    releases
        .iter()
        .filter(|r| r.environment == environment && r.is_finalized())
        .max_by(|a, b| a.id.cmp(&b.id))
}
