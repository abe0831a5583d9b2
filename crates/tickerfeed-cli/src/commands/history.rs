use tickerfeed_core::{classify, normalize, Interval, MarketDataService};

use crate::cli::HistoryArgs;
use crate::error::CliError;

use super::quote::error_value;
use super::CommandOutput;

pub async fn run(
    args: &HistoryArgs,
    service: &MarketDataService,
) -> Result<CommandOutput, CliError> {
    let symbol = normalize(&args.symbol)?;
    let asset_class = args
        .asset_class
        .resolve()
        .unwrap_or_else(|| classify(&symbol));

    match service
        .fetch_history_report(&symbol, asset_class, args.days, Interval::from(args.interval))
        .await
    {
        Ok(report) => Ok(CommandOutput::ok(serde_json::to_value(report)?)),
        Err(error) => Ok(CommandOutput::failed(error_value(&error)?)),
    }
}
