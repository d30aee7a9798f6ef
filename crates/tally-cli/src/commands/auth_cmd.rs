use tally_core::auth::{AuthStatus, LoginRequest};
use tally_core::counters::Identity;
use tally_core::sync::DrainOutcome;

use crate::cli::AuthCommands;
use crate::commands::common::{print_drain, Session};
use crate::commands::sync::user_label;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, session: &Session) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            identifier,
            password,
            remember_me,
        } => run_login(identifier, password, remember_me, session).await,
        AuthCommands::Status => run_auth_status(session).await,
        AuthCommands::Logout => {
            session.auth.logout(true).await?;
            session.counters.set_identity(Identity::Guest);
            println!("Signed out");
            Ok(())
        }
    }
}

async fn run_login(
    identifier: String,
    password: String,
    remember_me: bool,
    session: &Session,
) -> Result<(), CliError> {
    let user = session
        .auth
        .login(&LoginRequest {
            identifier,
            password,
            remember_me,
        })
        .await?;
    println!("Signed in as {}", user_label(&user));

    let handed_over = session.counters.consolidate_guest_counters(&user.id).await?;
    if handed_over > 0 {
        println!("Uploading {handed_over} guest counter(s) to your account");
    }

    let report = session.flush().await;
    print_drain(Some(report));
    if matches!(report.outcome, DrainOutcome::Empty | DrainOutcome::Completed) {
        if let Err(error) = session.refresh_from_remote().await {
            tracing::warn!("Failed to load counters after sign-in: {}", error);
        }
    }
    Ok(())
}

async fn run_auth_status(session: &Session) -> Result<(), CliError> {
    match session.auth.initialize().await? {
        AuthStatus::SignedOut => println!("Not signed in."),
        AuthStatus::Verified(user) => println!("Signed in as {}", user_label(&user)),
        AuthStatus::Cached(user) => println!(
            "Signed in as {} (server unreachable; using cached profile)",
            user_label(&user)
        ),
        AuthStatus::Expired => {
            session.counters.set_identity(Identity::Guest);
            println!("Session expired; signed out.");
        }
    }
    Ok(())
}
