//! Worksmith CLI — the main entry point.
//!
//! Commands:
//! - `run`    — Execute a natural-language command against the workspace
//! - `tools`  — List the tool catalog by group
//! - `config` — Show the resolved configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod executor;

#[derive(Parser)]
#[command(
    name = "worksmith",
    about = "Worksmith — prompt-to-action command execution for your workspace",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ~/.worksmith/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a natural-language command
    Run {
        /// The command text
        command: String,

        /// Stream incremental events instead of waiting for the result
        #[arg(short, long)]
        stream: bool,

        /// Workspace id
        #[arg(long, default_value = "default")]
        workspace: String,

        /// User id
        #[arg(long, default_value = "cli")]
        user: String,

        /// Current project id
        #[arg(long)]
        project: Option<String>,

        /// Current tab id
        #[arg(long)]
        tab: Option<String>,

        /// Current table id
        #[arg(long)]
        table: Option<String>,

        /// Current block id
        #[arg(long)]
        block: Option<String>,
    },

    /// List the tool catalog by group
    Tools,

    /// Show the resolved configuration (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            command,
            stream,
            workspace,
            user,
            project,
            tab,
            table,
            block,
        } => {
            commands::run::run(
                cli.config.as_deref(),
                &command,
                stream,
                commands::run::ContextArgs {
                    workspace,
                    user,
                    project,
                    tab,
                    table,
                    block,
                },
            )
            .await?
        }
        Commands::Tools => commands::tools::run()?,
        Commands::Config => commands::config_cmd::run(cli.config.as_deref())?,
    }

    Ok(())
}
