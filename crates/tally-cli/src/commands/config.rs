use tally_core::config::AuthMode;

use crate::cli::{AuthModeArg, ConfigCommands};
use crate::config_file::{default_config_path, CliConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, api_url_override: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_base_url,
            timeout_secs,
            auth_mode,
        } => run_config_init(api_base_url, timeout_secs, auth_mode),
        ConfigCommands::Show { json } => run_config_show(json, api_url_override),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
    auth_mode: Option<AuthModeArg>,
) -> Result<(), CliError> {
    let mut config = CliConfig::load().map_err(CliError::Config)?;
    apply_config_init(&mut config, api_base_url, timeout_secs, auth_mode);

    // Reject values the client would refuse before they reach disk
    config.client_config(None).map_err(CliError::Config)?;
    let path = config.save().map_err(CliError::Config)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

pub fn apply_config_init(
    config: &mut CliConfig,
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
    auth_mode: Option<AuthModeArg>,
) {
    if api_base_url.is_some() {
        config.api_base_url = api_base_url;
    }
    if timeout_secs.is_some() {
        config.request_timeout_secs = timeout_secs;
    }
    if let Some(mode) = auth_mode {
        config.auth_mode = Some(match mode {
            AuthModeArg::Bearer => AuthMode::Bearer,
            AuthModeArg::Cookie => AuthMode::Cookie,
        });
    }
}

pub fn run_config_show(as_json: bool, api_url_override: Option<&str>) -> Result<(), CliError> {
    let config = CliConfig::load()
        .and_then(|config| config.client_config(api_url_override))
        .map_err(CliError::Config)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let path = default_config_path().map_err(CliError::Config)?;
    println!("Config file:  {}", path.display());
    println!("API URL:      {}", config.api_base_url);
    println!("Timeout:      {}s", config.request_timeout_secs);
    let auth_mode = match config.auth_mode {
        AuthMode::Bearer => "bearer",
        AuthMode::Cookie => "cookie",
    };
    println!("Auth mode:    {auth_mode}");
    Ok(())
}
