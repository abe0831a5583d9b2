use serde::Serialize;
use tickerfeed_core::{MarketDataService, QuoteOutcome};

use crate::cli::MultiArgs;
use crate::error::CliError;

use super::CommandOutput;

#[derive(Debug, Serialize)]
struct MultiResponseData {
    requested: usize,
    failed: usize,
    results: Vec<QuoteOutcome>,
}

pub async fn run(args: &MultiArgs, service: &MarketDataService) -> Result<CommandOutput, CliError> {
    let results = service
        .fetch_multiple(&args.symbols, args.asset_class.resolve())
        .await;
    let failed = results.iter().filter(|outcome| outcome.is_error()).count();

    let data = serde_json::to_value(MultiResponseData {
        requested: args.symbols.len(),
        failed,
        results,
    })?;

    if failed > 0 {
        Ok(CommandOutput::failed(data))
    } else {
        Ok(CommandOutput::ok(data))
    }
}
