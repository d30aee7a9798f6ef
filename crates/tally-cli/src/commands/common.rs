use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_core::auth::AuthService;
use tally_core::config::ClientConfig;
use tally_core::counters::{CounterStore, Identity};
use tally_core::db::{Database, LibSqlKeyValueStore};
use tally_core::http::ApiClient;
use tally_core::models::CounterKind;
use tally_core::queue::MutationQueue;
use tally_core::sync::{DrainOutcome, DrainReport, ProbeConnectivity, SyncProcessor, SyncTrigger};
use tally_core::{Counter, MutationCommand};

use crate::config_file::CliConfig;
use crate::credentials::KeyringCredentialStore;
use crate::error::CliError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub type CliStore = LibSqlKeyValueStore;
pub type CliClient = ApiClient<KeyringCredentialStore>;
pub type CliAuth = AuthService<KeyringCredentialStore>;
pub type CliProcessor = SyncProcessor<CliStore, CliClient, ProbeConnectivity, CliAuth>;

/// Remembers that an action asked for a drain; the command runs it once
/// before exiting instead of spawning one per action.
#[derive(Debug, Clone, Default)]
pub struct PendingFlush {
    requested: Arc<AtomicBool>,
}

impl PendingFlush {
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

impl SyncTrigger for PendingFlush {
    fn request_sync(&self) {
        self.requested.store(true, Ordering::Release);
    }
}

/// Everything one CLI invocation needs, wired over the local database
pub struct Session {
    _db: Database,
    pub config: ClientConfig,
    pub client: CliClient,
    pub auth: CliAuth,
    pub connectivity: ProbeConnectivity,
    pub processor: CliProcessor,
    pub counters: CounterStore<CliStore, PendingFlush>,
    flush: PendingFlush,
}

impl Session {
    pub async fn open(db_path: &Path, config: ClientConfig) -> Result<Self, CliError> {
        let db = Database::open(db_path).await?;
        let store = db.key_value_store();
        let queue = MutationQueue::new(store.clone());

        let credentials = KeyringCredentialStore::new(&config.api_base_url);
        let client = ApiClient::new(config.clone(), credentials)?;
        let auth = AuthService::new(client.clone());
        let connectivity = ProbeConnectivity::for_base_url(&config.api_base_url, PROBE_TIMEOUT)?;
        let processor = SyncProcessor::new(
            queue.clone(),
            client.clone(),
            connectivity.clone(),
            auth.clone(),
        );

        let identity = match auth.current_user()? {
            Some(user) => Identity::Account { user_id: user.id },
            None => Identity::Guest,
        };
        let flush = PendingFlush::default();
        let counters = CounterStore::new(store, queue, flush.clone(), identity);
        counters.load().await?;

        Ok(Self {
            _db: db,
            config,
            client,
            auth,
            connectivity,
            processor,
            counters,
            flush,
        })
    }

    pub fn queue(&self) -> &MutationQueue<CliStore> {
        self.processor.queue()
    }

    /// Run the drain an action requested, if any
    pub async fn finish(&self) -> Option<DrainReport> {
        if !self.flush.take() {
            return None;
        }
        Some(self.processor.trigger().await)
    }

    /// Drain unconditionally
    pub async fn flush(&self) -> DrainReport {
        self.flush.take();
        self.processor.trigger().await
    }

    /// Adopt the server's counters when signed in and nothing is pending
    pub async fn refresh_from_remote(&self) -> Result<bool, CliError> {
        if self.counters.identity().is_guest() {
            return Ok(false);
        }
        let remote = self.client.fetch_counters().await?;
        Ok(self.counters.sync_from_remote(remote).await?)
    }

    pub async fn resolve_counter(&self, query: &str) -> Result<Counter, CliError> {
        resolve_counter(query, &self.counters.counters().await)
    }
}

pub async fn open_session(
    db_path: &Path,
    api_url_override: Option<&str>,
) -> Result<Session, CliError> {
    let config = CliConfig::load()
        .and_then(|config| config.client_config(api_url_override))
        .map_err(CliError::Config)?;
    Session::open(db_path, config).await
}

pub fn normalize_counter_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCounterId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Exact id first, then a unique prefix
pub fn resolve_counter(query: &str, counters: &[Counter]) -> Result<Counter, CliError> {
    let query = normalize_counter_identifier(query)?;
    if let Some(counter) = counters.iter().find(|counter| counter.id.as_str() == query) {
        return Ok(counter.clone());
    }

    let matching = counters
        .iter()
        .filter(|counter| counter.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::CounterNotFound(query)),
        [counter] => Ok((*counter).clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|counter| short_id(counter.id.as_str()))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousCounterId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn truncate_title(title: &str, max_chars: usize) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_counter_line(counter: &Counter) -> String {
    let short_id = short_id(counter.id.as_str());
    let title = truncate_title(&counter.title, 30);
    let count = counter.count;
    match counter.kind {
        CounterKind::Personal => format!("{short_id:<13}  {title:<30}  {count:>8}"),
        CounterKind::Shared => format!("{short_id:<13}  {title:<30}  {count:>8}  shared"),
    }
}

pub fn format_counter_lines(counters: &[Counter]) -> Vec<String> {
    counters.iter().map(format_counter_line).collect()
}

pub fn format_command_lines(commands: &[MutationCommand]) -> Vec<String> {
    commands
        .iter()
        .map(|command| {
            format!(
                "{}  {:<9}  counter={}  {}",
                short_id(&command.id.to_string()),
                command.kind().as_str(),
                short_id(command.entity_id.as_str()),
                format_timestamp(command.timestamp)
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// One-line note on how a drain went, `None` when there is nothing to say
pub fn describe_drain(report: &DrainReport) -> Option<String> {
    match report.outcome {
        DrainOutcome::Empty | DrainOutcome::AlreadyRunning => None,
        DrainOutcome::Completed if report.discarded == 0 => {
            Some(format!("Synced {} change(s)", report.delivered))
        }
        DrainOutcome::Completed => Some(format!(
            "Synced {} change(s); {} rejected by the server and dropped",
            report.delivered, report.discarded
        )),
        DrainOutcome::Offline => Some("Offline; changes stay queued for the next sync".to_string()),
        DrainOutcome::Deferred => {
            Some("Server unavailable; changes stay queued for the next sync".to_string())
        }
        DrainOutcome::SessionExpired => Some(
            "Session expired; run `tally auth login` to sync queued changes".to_string(),
        ),
        DrainOutcome::StorageFailed => Some("Failed to update the local sync queue".to_string()),
    }
}

pub fn print_drain(report: Option<DrainReport>) {
    if let Some(note) = report.as_ref().and_then(describe_drain) {
        println!("{note}");
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("TALLY_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("tally").join("tally.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}
