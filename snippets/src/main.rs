use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod commands;
mod config;
mod discovery;
mod errors;
mod formatters;
mod http_utils;
mod operations;
mod poll;
mod runner;
mod session;
mod stories;

use commands::{
    auth::{SignInCommand, SignOutCommand},
    stories::{ListCommand, RunCommand},
    Command, CommandContext,
};
use poll::CancelSignal;

#[derive(Parser)]
#[command(name = "o365-snippets")]
#[command(about = "Office 365 REST snippets - runs CRUD stories against a live tenant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every story, grouped by service
    List {
        /// Print the catalogue as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run stories; without filters every story runs
    Run {
        /// Run every story of a group, e.g. "Mail folder"
        #[arg(long = "group", value_name = "GROUP")]
        groups: Vec<String>,
        /// Run a single story by "Group/Title", e.g. "Files/Copy file"
        #[arg(long = "story", value_name = "STORY")]
        stories: Vec<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Sign in interactively and cache the tokens
    SignIn,
    /// Remove cached tokens
    SignOut,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for results
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("o365_snippets={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (cancel_handle, cancel) = CancelSignal::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current story");
            cancel_handle.cancel();
        }
    });

    let context = CommandContext::new(cli.config, cancel);

    let mut command: Box<dyn Command + Send> = match cli.command {
        Commands::List { json } => Box::new(ListCommand { json }),
        Commands::Run {
            groups,
            stories,
            json,
            no_color,
        } => Box::new(RunCommand {
            groups,
            stories,
            json,
            no_color,
        }),
        Commands::SignIn => Box::new(SignInCommand),
        Commands::SignOut => Box::new(SignOutCommand),
    };

    command.execute(&context).await.context("Command failed")?;
    info!("Done");
    Ok(())
}
