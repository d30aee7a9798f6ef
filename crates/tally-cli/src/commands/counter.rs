use tally_core::models::CounterPatch;

use crate::commands::common::{format_counter_line, print_drain, Session};
use crate::error::CliError;

pub async fn run_create(title: &str, color: Option<&str>, session: &Session) -> Result<(), CliError> {
    let counter = session.counters.create(title, color).await?;
    println!("{}", format_counter_line(&counter));
    print_drain(session.finish().await);
    Ok(())
}

pub async fn run_increment(id: &str, amount: i64, session: &Session) -> Result<(), CliError> {
    let counter = session.resolve_counter(id).await?;
    let counter = session.counters.increment(&counter.id, amount).await?;
    println!("{}", format_counter_line(&counter));
    print_drain(session.finish().await);
    Ok(())
}

pub async fn run_update(
    id: &str,
    title: Option<String>,
    color: Option<String>,
    session: &Session,
) -> Result<(), CliError> {
    if title.is_none() && color.is_none() {
        return Err(CliError::EmptyUpdate);
    }
    let counter = session.resolve_counter(id).await?;
    let counter = session
        .counters
        .update(&counter.id, CounterPatch { title, color })
        .await?;
    println!("{}", format_counter_line(&counter));
    print_drain(session.finish().await);
    Ok(())
}

pub async fn run_delete(id: &str, session: &Session) -> Result<(), CliError> {
    let counter = session.resolve_counter(id).await?;
    let removed = session.counters.delete(&counter.id).await?;
    println!("Deleted counter {} ({})", removed.id, removed.title);
    print_drain(session.finish().await);
    Ok(())
}

pub async fn run_leave(id: &str, session: &Session) -> Result<(), CliError> {
    let counter = session.resolve_counter(id).await?;
    let removed = session.counters.remove_shared(&counter.id).await?;
    println!("Left shared counter {} ({})", removed.id, removed.title);
    print_drain(session.finish().await);
    Ok(())
}

/// Joining needs the server right away; it is not queued
pub async fn run_join(code: &str, session: &Session) -> Result<(), CliError> {
    session.auth.require_user()?;
    let code = code.trim();
    if code.is_empty() {
        return Err(CliError::EmptyInviteCode);
    }

    let counter = session.client.join_counter(code).await?;
    session.counters.apply_joined(counter.clone()).await?;
    println!("Joined {}", format_counter_line(&counter));
    Ok(())
}
