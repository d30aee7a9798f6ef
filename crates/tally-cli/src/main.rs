//! Tally CLI - counters from the command line
//!
//! Works offline as a guest; once signed in, every change is queued locally
//! and replayed against the API in order.

mod cli;
mod commands;
mod config_file;
mod credentials;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::{open_session, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::counter::{
    run_create, run_delete, run_increment, run_join, run_leave, run_update,
};
use crate::commands::list::run_list;
use crate::commands::sync::{run_queue, run_queue_clear, run_status, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "tally=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let api_url = cli.api_url.as_deref();

    // Commands that never touch the database
    let command = match cli.command {
        Commands::Completions { shell, output } => {
            return run_completions(shell, output.as_deref());
        }
        Commands::Config { command } => return run_config(command, api_url),
        command => command,
    };

    let db_path = resolve_db_path(cli.db_path)?;
    let session = open_session(&db_path, api_url).await?;

    match command {
        Commands::List { json, refresh } => run_list(json, refresh, &session).await,
        Commands::Create { title, color } => run_create(&title, color.as_deref(), &session).await,
        Commands::Increment { id, by } => run_increment(&id, by, &session).await,
        Commands::Update { id, title, color } => run_update(&id, title, color, &session).await,
        Commands::Delete { id } => run_delete(&id, &session).await,
        Commands::Leave { id } => run_leave(&id, &session).await,
        Commands::Join { code } => run_join(&code, &session).await,
        Commands::Sync => run_sync(&session).await,
        Commands::Status { json } => run_status(json, &session).await,
        Commands::Queue { json } => run_queue(json, &session).await,
        Commands::QueueClear => run_queue_clear(&session).await,
        Commands::Auth { command } => run_auth(command, &session).await,
        Commands::Completions { .. } | Commands::Config { .. } => Ok(()),
    }
}
