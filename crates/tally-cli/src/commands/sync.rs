use serde::Serialize;
use tally_core::sync::{Connectivity, DrainOutcome};

use crate::commands::common::{describe_drain, format_command_lines, Session};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub api_base_url: String,
    pub signed_in_as: Option<String>,
    pub online: bool,
    pub queue_length: usize,
}

pub async fn run_sync(session: &Session) -> Result<(), CliError> {
    let report = session.flush().await;
    match report.outcome {
        DrainOutcome::Empty => println!("Nothing to sync"),
        DrainOutcome::Offline => {
            return Err(CliError::Offline(session.config.api_base_url.clone()));
        }
        _ => {
            if let Some(note) = describe_drain(&report) {
                println!("{note}");
            }
        }
    }

    if matches!(report.outcome, DrainOutcome::Empty | DrainOutcome::Completed)
        && session.refresh_from_remote().await?
    {
        println!("Counters reloaded from the server");
    }
    Ok(())
}

pub async fn run_status(as_json: bool, session: &Session) -> Result<(), CliError> {
    let status = session.processor.status().await;
    let item = StatusItem {
        api_base_url: session.config.api_base_url.clone(),
        signed_in_as: session.auth.current_user()?.map(|user| user_label(&user)),
        online: session.connectivity.is_online().await,
        queue_length: status.queue_length,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("API:      {}", item.api_base_url);
    println!(
        "Account:  {}",
        item.signed_in_as.as_deref().unwrap_or("guest (changes stay on this device)")
    );
    println!("Network:  {}", if item.online { "online" } else { "offline" });
    println!("Pending:  {} change(s)", item.queue_length);
    Ok(())
}

pub async fn run_queue(as_json: bool, session: &Session) -> Result<(), CliError> {
    let commands = session.queue().read_all().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&commands)?);
        return Ok(());
    }

    if commands.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }
    for line in format_command_lines(&commands) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_queue_clear(session: &Session) -> Result<(), CliError> {
    let dropped = session.queue().len().await?;
    session.queue().clear().await?;
    println!("Dropped {dropped} pending change(s)");
    Ok(())
}

pub fn user_label(user: &tally_core::auth::AuthUser) -> String {
    user.email
        .clone()
        .or_else(|| user.phone.clone())
        .unwrap_or_else(|| user.id.clone())
}
