//! Centralized error types for stagecraft
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.
//! Every error kind maps to a process exit code via [`exit_code`].

use thiserror::Error;

use crate::domain::release::{Phase, PhaseStatus};

/// Exit code for validation and configuration errors.
pub const EXIT_VALIDATION: i32 = 1;
/// Exit code for internal errors (render failures, registry corruption).
pub const EXIT_INTERNAL: i32 = 2;
/// Exit code when infrastructure bootstrap fails globally.
pub const EXIT_BOOTSTRAP_GLOBAL: i32 = 3;
/// Exit code when bootstrap fails on some hosts but succeeds on others.
pub const EXIT_BOOTSTRAP_PARTIAL: i32 = 10;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Unknown environment '{name}'. Available environments: {available}")]
    UnknownEnvironment { name: String, available: String },

    #[error("Unknown {component} provider '{id}'. Registered providers: {available}")]
    UnknownProvider {
        component: &'static str,
        id: String,
        available: String,
    },

    #[error("No configuration for {component} provider '{id}' under providers.{id}")]
    MissingProviderConfig { component: &'static str, id: String },

    #[error("Required configuration missing: {field}")]
    MissingField { field: String },
}

/// Validation errors (bad flags, ineligible rollback targets)
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("only one rollback target flag may be specified")]
    RollbackTargetConflict,

    #[error("no rollback target: pass one of --to-previous, --to-release or --to-version")]
    RollbackTargetMissing,

    #[error("release {id} is already the current release in '{environment}'")]
    RollbackTargetIsCurrent { id: String, environment: String },

    #[error("release {id} is not fully deployed: phase \"{phase}\" is {status}")]
    RollbackTargetIncomplete {
        id: String,
        phase: Phase,
        status: PhaseStatus,
    },

    #[error("current release in '{environment}' has no previous release")]
    NoPreviousRelease { environment: String },

    #[error("release {id} belongs to environment '{actual}', not '{requested}'")]
    ReleaseEnvironmentMismatch {
        id: String,
        actual: String,
        requested: String,
    },

    #[error("no release with version '{version}' in environment '{environment}'")]
    NoReleaseForVersion {
        version: String,
        environment: String,
    },

    #[error("release version must not be empty")]
    EmptyVersion,

    #[error("config file already exists at {path}")]
    ConfigExists { path: String },
}

/// Planning errors
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("operation '{id}' depends on '{dep}', which is not an earlier operation")]
    ForwardDependency { id: String, dep: String },

    #[error("operation '{id}' appears more than once in the plan")]
    DuplicateOperation { id: String },

    #[error("{kind} filter '{value}' matches nothing in the plan. Available: {available}")]
    FilterUnmatched {
        kind: &'static str,
        value: String,
        available: String,
    },

    #[error("step '{step}' is attributed to a host with an empty logical id")]
    EmptyHostId { step: String },
}

/// Execution errors from the phase engine
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("phase \"{phase}\" failed")]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("required binary '{binary}' not found in PATH")]
    BinaryNotFound { binary: String },

    #[error("{command} exited with status {code}")]
    CommandFailed { command: String, code: i32 },
}

/// Persistence errors from the release state store
#[derive(Error, Debug)]
pub enum StateError {
    #[error("release not found: {id}")]
    ReleaseNotFound { id: String },

    #[error("no current release for environment '{environment}'")]
    NoCurrentRelease { environment: String },

    #[error("illegal phase transition on release {id}: {phase} {from} -> {to}")]
    IllegalTransition {
        id: String,
        phase: Phase,
        from: PhaseStatus,
        to: PhaseStatus,
    },

    #[error("failed to read state file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to write state file {path}: {message}")]
    Write { path: String, message: String },
}

/// Infrastructure bootstrap errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("bootstrap failed globally: {message}")]
    Global { message: String },

    #[error("bootstrap failed on all {total} hosts")]
    AllHostsFailed { total: usize },

    #[error("bootstrap failed on {failed} of {total} hosts")]
    Partial { failed: usize, total: usize },
}

/// Internal errors that indicate a bug or a broken environment
#[derive(Error, Debug)]
pub enum InternalError {
    #[error("render failure: {message}")]
    Render { message: String },
}

/// Map an error chain to the process exit code.
///
/// The first recognized typed error in the chain wins; unclassified
/// errors are reported as validation failures.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<BootstrapError>() {
            return match e {
                BootstrapError::Global { .. } | BootstrapError::AllHostsFailed { .. } => {
                    EXIT_BOOTSTRAP_GLOBAL
                }
                BootstrapError::Partial { .. } => EXIT_BOOTSTRAP_PARTIAL,
            };
        }
        if let Some(e) = cause.downcast_ref::<StateError>() {
            return match e {
                StateError::ReleaseNotFound { .. } | StateError::NoCurrentRelease { .. } => {
                    EXIT_VALIDATION
                }
                _ => EXIT_INTERNAL,
            };
        }
        if cause.downcast_ref::<InternalError>().is_some() {
            return EXIT_INTERNAL;
        }
        if cause.downcast_ref::<ConfigError>().is_some()
            || cause.downcast_ref::<ValidationError>().is_some()
            || cause.downcast_ref::<PlanError>().is_some()
            || cause.downcast_ref::<ExecutionError>().is_some()
        {
            return EXIT_VALIDATION;
        }
    }
    EXIT_VALIDATION
}
