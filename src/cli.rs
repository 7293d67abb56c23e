//! CLI definitions for stagecraft
//!
//! This module contains all CLI argument parsing structures using
//! clap. Global flags resolve in precedence order: explicit CLI
//! value, then `STAGECRAFT_<UPPER>` environment variable, then the
//! config file default (applied in main for `--env`), then the
//! built-in default.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stagecraft",
    version,
    about = "Deployment orchestrator for multi-service container applications",
    long_about = "Stagecraft turns one declarative project file into deterministic\ndeployment plans and executes them with strict phase accounting and\ndurable release history, from local dev through multi-host fleets."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the project configuration file
    #[arg(
        long,
        global = true,
        env = "STAGECRAFT_CONFIG",
        default_value = "stagecraft.yml"
    )]
    pub config: PathBuf,

    /// Target environment
    #[arg(long, global = true, env = "STAGECRAFT_ENV", default_value = "dev")]
    pub env: String,

    /// Enable verbose logging
    #[arg(short, long, global = true, env = "STAGECRAFT_VERBOSE")]
    pub verbose: bool,

    /// Plan and validate without creating releases or running providers
    #[arg(long, global = true, env = "STAGECRAFT_DRY_RUN")]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a minimal project configuration
    Init {
        /// Project name (defaults to the working directory name)
        #[arg(long)]
        project_name: Option<String>,

        /// Never prompt; take defaults for anything not provided
        #[arg(long)]
        non_interactive: bool,
    },

    /// Render and start the local development topology
    Dev {
        /// Serve plain HTTP instead of HTTPS
        #[arg(long)]
        no_https: bool,

        /// Skip the traefik reverse proxy
        #[arg(long)]
        no_traefik: bool,

        /// Skip printing /etc/hosts suggestions
        #[arg(long)]
        no_hosts: bool,

        /// Run containers in the background
        #[arg(long)]
        detach: bool,
    },

    /// Show the deployment plan for an environment
    Plan {
        #[command(subcommand)]
        command: Option<PlanCommands>,

        /// Version to plan for (defaults to the git short SHA)
        #[arg(long)]
        version: Option<String>,

        /// Only plan these services
        #[arg(long, value_delimiter = ',')]
        services: Vec<String>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Build the backend image
    Build {
        /// Version to tag the image with (defaults to the git short SHA)
        #[arg(long)]
        version: Option<String>,

        /// Push the image after building
        #[arg(long)]
        push: bool,

        /// Only build these services
        #[arg(long, value_delimiter = ',')]
        services: Vec<String>,
    },

    /// Run database migrations
    Migrate {
        /// Only this database (defaults to every configured database)
        #[arg(long)]
        database: Option<String>,

        /// Show which migrations would run instead of applying them
        #[arg(long)]
        plan: bool,
    },

    /// Deploy to an environment through the six-phase pipeline
    Deploy {
        /// Version to deploy (defaults to the git short SHA)
        #[arg(long)]
        version: Option<String>,
    },

    /// Roll an environment back to an earlier fully-deployed release
    Rollback {
        /// Target the current release's predecessor
        #[arg(long)]
        to_previous: bool,

        /// Target a specific release id
        #[arg(long, value_name = "ID")]
        to_release: Option<String>,

        /// Target the most recent release with this version
        #[arg(long, value_name = "V")]
        to_version: Option<String>,
    },

    /// Inspect release history
    Releases {
        #[command(subcommand)]
        command: ReleasesCommands,
    },

    /// Host-side execution of sliced plans
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Provision and bootstrap environment infrastructure
    Infra {
        #[command(subcommand)]
        command: InfraCommands,
    },

    /// Governance reporting
    Gov {
        #[command(subcommand)]
        command: GovCommands,
    },

    /// Commit history tooling
    Commit {
        #[command(subcommand)]
        command: CommitCommands,
    },

    /// Project status reporting
    Status {
        #[command(subcommand)]
        command: StatusCommands,
    },

    /// Project context extraction
    Context {
        #[command(subcommand)]
        command: ContextCommands,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Emit the lowered engine plan
    Deploy {
        /// Write the engine plan as JSON to this path
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
    },

    /// Slice a plan into per-host plans
    Slice {
        /// Read an engine plan from this file instead of planning
        #[arg(long, value_name = "FILE")]
        plan: Option<PathBuf>,

        /// Directory to write host plans into
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ReleasesCommands {
    /// List releases, newest first. Scoped by --env when given
    /// explicitly; otherwise all environments, grouped.
    List,

    /// Show one release with its phase table
    Show {
        /// Release id
        release_id: String,
    },
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Execute a host plan on this machine
    Run {
        /// Path to the host plan JSON
        #[arg(long, value_name = "FILE")]
        hostplan: PathBuf,

        /// Write step results as JSON to this path
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum InfraCommands {
    /// Bootstrap every host in the environment
    Up,
}

#[derive(Subcommand)]
pub enum GovCommands {
    /// Map features to the commands and components that implement them
    FeatureMapping {
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum CommitCommands {
    /// Summarize recent commit history by conventional-commit type
    Report,

    /// Suggest a commit message for the staged changes
    Suggest,
}

#[derive(Subcommand)]
pub enum StatusCommands {
    /// Show per-environment release status
    Roadmap,
}

#[derive(Subcommand)]
pub enum ContextCommands {
    /// Write a project context summary for handoff
    Build,

    /// Show per-directory source statistics
    Xray,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_defaults() {
        let cli = Cli::try_parse_from(["stagecraft", "releases", "list"]).unwrap();
        assert_eq!(cli.env, "dev");
        assert_eq!(cli.config, PathBuf::from("stagecraft.yml"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["stagecraft", "deploy", "--env", "staging", "--dry-run"])
                .unwrap();
        assert_eq!(cli.env, "staging");
        assert!(cli.dry_run);
    }

    #[test]
    fn test_plan_services_delimiter() {
        let cli = Cli::try_parse_from([
            "stagecraft",
            "plan",
            "--env",
            "staging",
            "--services",
            "backend,frontend",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan { services, .. } => {
                assert_eq!(services, vec!["backend", "frontend"]);
            }
            _ => panic!("expected plan command"),
        }
    }

    #[test]
    fn test_rollback_flags_parse_independently() {
        let cli = Cli::try_parse_from([
            "stagecraft",
            "rollback",
            "--env",
            "staging",
            "--to-release",
            "rel-20260301-120000000-001",
        ])
        .unwrap();
        match cli.command {
            Commands::Rollback {
                to_previous,
                to_release,
                to_version,
            } => {
                assert!(!to_previous);
                assert!(to_release.is_some());
                assert!(to_version.is_none());
            }
            _ => panic!("expected rollback command"),
        }
    }
}
