mod history;
mod multi;
mod quote;

use serde_json::Value;
use tickerfeed_core::{MarketDataService, TickerfeedConfig};
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandOutput {
    pub data: Value,
    /// At least one lookup ended in a `FetchError`.
    pub failed: bool,
}

impl CommandOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            failed: false,
        }
    }

    pub fn failed(data: Value) -> Self {
        Self { data, failed: true }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let config = load_config(cli)?;
    debug!(
        finnhub = config.finnhub_key().is_some(),
        alphavantage = config.alphavantage_key().is_some(),
        "configuration loaded"
    );
    let service = MarketDataService::from_config(&config);

    match &cli.command {
        Command::Quote(args) => quote::run(args, &service).await,
        Command::History(args) => history::run(args, &service).await,
        Command::Multi(args) => multi::run(args, &service).await,
    }
}

fn load_config(cli: &Cli) -> Result<TickerfeedConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => TickerfeedConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => TickerfeedConfig::default(),
    };
    if let Some(timeout_ms) = cli.timeout_ms {
        config.provider_timeout_ms = timeout_ms;
    }
    Ok(config.with_env_keys())
}
