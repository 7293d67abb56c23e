use anyhow::Result;
use clap::{CommandFactory, FromArgMatches};

mod bootstrap;
mod cli;
mod commands;
mod config;
mod domain;
mod engine;
mod error;
mod exec;
mod git;
mod planner;
mod providers;
mod store;
mod ui;

#[cfg(test)]
mod property_tests;

use cli::{
    AgentCommands, Cli, Commands, CommitCommands, ContextCommands, GovCommands, InfraCommands,
    PlanCommands, ReleasesCommands, StatusCommands,
};
use commands::GlobalOpts;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => {}
        Err(err) => {
            ui::print_error(&format!("{err:#}"));
            std::process::exit(error::exit_code(&err));
        }
    }
}

async fn run() -> Result<()> {
    let matches = Cli::command().get_matches();
    let mut cli = Cli::from_arg_matches(&matches)?;

    // Initialize logging with LOGGING env var support
    // LOGGING=debug,info,warn,error or just LOGGING=debug
    let log_level = std::env::var("LOGGING")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| {
            if cli.verbose {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    providers::register_builtins();

    // --env precedence: explicit flag, then STAGECRAFT_ENV, then the
    // config file's project.default_env, then the built-in default.
    let env_is_explicit =
        matches.value_source("env") != Some(clap::parser::ValueSource::DefaultValue);
    if !env_is_explicit {
        if let Ok(config) = config::Config::load(&cli.config) {
            if let Some(default_env) = config.project.default_env {
                cli.env = default_env;
            }
        }
    }

    let opts = GlobalOpts {
        config_path: cli.config.clone(),
        env: cli.env.clone(),
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Init {
            project_name,
            non_interactive,
        } => commands::init::execute(&opts, project_name, non_interactive).await,
        Commands::Dev {
            no_https,
            no_traefik,
            no_hosts,
            detach,
        } => commands::dev::execute(&opts, no_https, no_traefik, no_hosts, detach).await,
        Commands::Plan {
            command,
            version,
            services,
            format,
        } => match command {
            Some(PlanCommands::Deploy { json }) => {
                commands::plan::execute_deploy(&opts, json).await
            }
            Some(PlanCommands::Slice { plan, output_dir }) => {
                commands::plan::execute_slice(&opts, plan, output_dir).await
            }
            None => commands::plan::execute(&opts, version, services, format).await,
        },
        Commands::Build {
            version,
            push,
            services,
        } => commands::build::execute(&opts, version, push, services).await,
        Commands::Migrate { database, plan } => {
            commands::migrate::execute(&opts, database, plan).await
        }
        Commands::Deploy { version } => commands::deploy::execute(&opts, version).await,
        Commands::Rollback {
            to_previous,
            to_release,
            to_version,
        } => commands::rollback::execute(&opts, to_previous, to_release, to_version).await,
        Commands::Releases { command } => match command {
            ReleasesCommands::List => {
                let scope = env_is_explicit.then(|| cli.env.clone());
                commands::releases::list(&opts, scope).await
            }
            ReleasesCommands::Show { release_id } => {
                commands::releases::show(&opts, &release_id).await
            }
        },
        Commands::Agent { command } => match command {
            AgentCommands::Run { hostplan, output } => {
                commands::agent::run(&opts, hostplan, output).await
            }
        },
        Commands::Infra { command } => match command {
            InfraCommands::Up => commands::infra::up(&opts).await,
        },
        Commands::Gov { command } => match command {
            GovCommands::FeatureMapping { format } => {
                commands::gov::feature_mapping(&opts, format).await
            }
        },
        Commands::Commit { command } => match command {
            CommitCommands::Report => commands::commit::report(&opts).await,
            CommitCommands::Suggest => commands::commit::suggest(&opts).await,
        },
        Commands::Status { command } => match command {
            StatusCommands::Roadmap => commands::status::roadmap(&opts).await,
        },
        Commands::Context { command } => match command {
            ContextCommands::Build => commands::context::build(&opts).await,
            ContextCommands::Xray => commands::context::xray(&opts).await,
        },
    }
}
