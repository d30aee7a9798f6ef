use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Count things from the command line, online or off")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// API base URL for this invocation (overrides config and environment)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List counters
    #[command(alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Flush pending changes and reload counters from the server first
        #[arg(long)]
        refresh: bool,
    },
    /// Create a counter
    #[command(alias = "new")]
    Create {
        /// Counter title
        title: String,
        /// Colour as #RRGGBB
        #[arg(long, value_name = "HEX")]
        color: Option<String>,
    },
    /// Add to (or, with a negative amount, subtract from) a counter
    #[command(alias = "inc")]
    Increment {
        /// Counter ID or unique ID prefix
        id: String,
        /// Amount to add
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        by: i64,
    },
    /// Rename or recolour a counter
    Update {
        /// Counter ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Colour as #RRGGBB
        #[arg(long, value_name = "HEX")]
        color: Option<String>,
    },
    /// Delete a counter you own
    Delete {
        /// Counter ID or unique ID prefix
        id: String,
    },
    /// Leave a shared counter
    Leave {
        /// Counter ID or unique ID prefix
        id: String,
    },
    /// Join a shared counter with an invite code
    Join {
        /// Invite code
        code: String,
    },
    /// Replay queued changes against the server
    Sync,
    /// Show sync state and queue length
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List changes waiting to be synced
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop every change waiting to be synced
    QueueClear,
    /// Sign in or out of the Tally API
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Configure the CLI
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum AuthModeArg {
    Bearer,
    Cookie,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in, store credentials in the keychain and upload guest counters
    Login {
        /// Account email, or phone number
        #[arg(long, value_name = "EMAIL_OR_PHONE")]
        identifier: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Ask for a persistent session
        #[arg(long)]
        remember_me: bool,
    },
    /// Check the stored session with the server
    Status,
    /// Sign out and clear stored credentials
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// API base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// How credentials are sent
        #[arg(long, value_enum)]
        auth_mode: Option<AuthModeArg>,
    },
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
