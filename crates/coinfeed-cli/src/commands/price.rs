use coinfeed_core::{Fetcher, Quote};
use serde::Serialize;

use crate::cli::{Cli, PriceArgs};
use crate::error::CliError;

use super::{parse_symbol, report_error, CommandResult};

#[derive(Debug, Serialize)]
struct PriceResponseData {
    quotes: Vec<Quote>,
}

pub async fn run(args: &PriceArgs, cli: &Cli, fetcher: &Fetcher) -> Result<CommandResult, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| parse_symbol(raw, cli))
        .collect::<Result<Vec<_>, _>>()?;

    let mut quotes = Vec::with_capacity(symbols.len());
    let mut errors = Vec::new();
    for symbol in &symbols {
        match fetcher.realtime_price(symbol).await {
            Ok(quote) => quotes.push(quote),
            Err(error) => errors.push(report_error(&error, symbol.to_string())),
        }
    }

    let data = serde_json::to_value(PriceResponseData { quotes })?;
    Ok(CommandResult::ok(data, fetcher.provider()).with_errors(errors))
}
