//! Process execution
//!
//! Command runners for docker, compose and SSH. The rest of the
//! system describes work; this module is the only place that turns a
//! description into a running process.

pub mod compose;
pub mod docker;

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::hostplan::Host;
use crate::error::ExecutionError;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// First non-empty line of stderr, for compact error reporting.
    pub fn error_line(&self) -> String {
        self.stderr
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("command failed with no output")
            .to_string()
    }
}

/// Runs a shell command against a host. The SSH implementation talks
/// to real machines; the no-op implementation backs dry runs and
/// tests.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, host: &Host, command: &str) -> Result<ExecOutput>;
}

/// Executes commands over SSH in batch mode.
pub struct SshExecutor {
    user: String,
}

impl SshExecutor {
    pub fn new(user: impl Into<String>) -> Result<Self> {
        which::which("ssh").map_err(|_| ExecutionError::BinaryNotFound {
            binary: "ssh".to_string(),
        })?;
        Ok(Self { user: user.into() })
    }

    fn target(&self, host: &Host) -> String {
        let address = if host.public_ip.is_empty() {
            host.display_name().to_string()
        } else {
            host.public_ip.clone()
        };
        format!("{}@{}", self.user, address)
    }
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    async fn run(&self, host: &Host, command: &str) -> Result<ExecOutput> {
        let output = Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("ConnectTimeout=15")
            .arg(self.target(host))
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("spawning ssh to {}", host.logical_id))?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Logs commands instead of running them. Used for dry runs.
pub struct NoopExecutor;

#[async_trait]
impl CommandExecutor for NoopExecutor {
    async fn run(&self, host: &Host, command: &str) -> Result<ExecOutput> {
        tracing::debug!(host = %host.logical_id, command, "skipping command (no-op executor)");
        Ok(ExecOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Run a command locally, streaming output to the terminal, and fail
/// on non-zero exit.
pub async fn run_local(program: &str, args: &[&str], envs: &[(String, String)]) -> Result<()> {
    let mut command = Command::new(program);
    command.args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    let status = command
        .status()
        .await
        .with_context(|| format!("spawning {program}"))?;

    if !status.success() {
        return Err(ExecutionError::CommandFailed {
            command: format!("{program} {}", args.join(" ")),
            code: status.code().unwrap_or(-1),
        }
        .into());
    }
    Ok(())
}

/// Run a command locally, capturing output.
pub async fn capture_local(program: &str, args: &[&str]) -> Result<ExecOutput> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("spawning {program}"))?;
    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
