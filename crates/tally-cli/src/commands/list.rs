use tally_core::sync::DrainOutcome;

use crate::commands::common::{describe_drain, format_counter_lines, Session};
use crate::error::CliError;

pub async fn run_list(as_json: bool, refresh: bool, session: &Session) -> Result<(), CliError> {
    if refresh {
        let report = session.flush().await;
        if !as_json {
            if let Some(note) = describe_drain(&report) {
                println!("{note}");
            }
        }
        if matches!(report.outcome, DrainOutcome::Empty | DrainOutcome::Completed) {
            if let Err(error) = session.refresh_from_remote().await {
                tracing::warn!("Failed to reload counters from the server: {}", error);
            }
        }
    }

    let counters = session.counters.counters().await;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&counters)?);
        return Ok(());
    }

    if counters.is_empty() {
        println!("No counters yet. Create one with `tally create <title>`.");
        return Ok(());
    }
    for line in format_counter_lines(&counters) {
        println!("{line}");
    }
    Ok(())
}
