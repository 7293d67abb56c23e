//! Git helpers: commit identity for release records.
//!
//! Deployments stamp releases with the current HEAD. Both lookups
//! are best effort at the call sites; a repo-less working directory
//! deploys with an empty commit SHA.

use anyhow::{Context, Result};
use std::process::Command;

/// Full SHA of HEAD.
pub fn head_sha() -> Result<String> {
    rev_parse(&["rev-parse", "HEAD"])
}

/// Short (7 character) SHA of HEAD, used as the default version.
pub fn head_short_sha() -> Result<String> {
    rev_parse(&["rev-parse", "--short=7", "HEAD"])
}

fn rev_parse(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .context("Failed to execute git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Subjects of the most recent commits, newest first.
pub fn recent_subjects(limit: usize) -> Result<Vec<String>> {
    let count = format!("-{limit}");
    let output = Command::new("git")
        .args(["log", &count, "--pretty=format:%s"])
        .output()
        .context("Failed to execute git log")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git log failed: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Paths staged for the next commit.
pub fn staged_files() -> Result<Vec<String>> {
    let output = Command::new("git")
        .args(["diff", "--cached", "--name-only"])
        .output()
        .context("Failed to execute git diff")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git diff failed: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
