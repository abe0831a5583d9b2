use serde::Serialize;
use serde_json::Value;
use tickerfeed_core::{classify, normalize, FetchError, MarketDataService};

use crate::cli::QuoteArgs;
use crate::error::CliError;

use super::CommandOutput;

pub async fn run(args: &QuoteArgs, service: &MarketDataService) -> Result<CommandOutput, CliError> {
    let symbol = normalize(&args.symbol)?;
    let asset_class = args
        .asset_class
        .resolve()
        .unwrap_or_else(|| classify(&symbol));

    match service.fetch_quote_report(&symbol, asset_class).await {
        Ok(report) => Ok(CommandOutput::ok(serde_json::to_value(report)?)),
        Err(error) => Ok(CommandOutput::failed(error_value(&error)?)),
    }
}

#[derive(Debug, Serialize)]
struct FailureData<'a> {
    status: &'static str,
    message: String,
    error: &'a FetchError,
}

pub(super) fn error_value(error: &FetchError) -> Result<Value, CliError> {
    Ok(serde_json::to_value(FailureData {
        status: "error",
        message: error.to_string(),
        error,
    })?)
}
