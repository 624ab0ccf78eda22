use std::fmt::Write as _;
use std::str::FromStr;

use coinfeed_core::{Fetcher, MultiTimeframeCandles, Timeframe};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::cli::{Cli, MultiArgs};
use crate::error::CliError;
use crate::notify::TelegramNotifier;

use super::{parse_symbol, report_error, CommandResult};

pub async fn run(args: &MultiArgs, cli: &Cli, fetcher: &Fetcher) -> Result<CommandResult, CliError> {
    let symbol = parse_symbol(&args.symbol, cli)?;
    let timeframes = args
        .timeframes
        .iter()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| Timeframe::from_str(raw))
        .collect::<Result<Vec<_>, _>>()?;
    if timeframes.is_empty() {
        return Err(CliError::Command(String::from(
            "at least one timeframe is required",
        )));
    }

    let outcome = fetcher
        .multi_timeframe_candles(&symbol, &timeframes, args.count)
        .await;

    let mut per_timeframe = Map::new();
    for (timeframe, candles) in outcome.succeeded() {
        per_timeframe.insert(timeframe.as_str().to_owned(), serde_json::to_value(candles)?);
    }
    let errors = outcome
        .failed()
        .map(|(timeframe, error)| report_error(error, timeframe.as_str()))
        .collect::<Vec<_>>();

    let mut result = CommandResult::ok(
        json!({
            "symbol": outcome.symbol(),
            "complete": outcome.is_complete(),
            "timeframes": Value::Object(per_timeframe),
        }),
        fetcher.provider(),
    )
    .with_errors(errors);

    if args.notify {
        let delivery = match TelegramNotifier::from_overrides(None, None) {
            Ok(notifier) => deliver(&notifier, &summarize(&outcome)).await,
            Err(error) => Some(error.to_string()),
        };
        if let Some(warning) = delivery {
            result = result.with_warning(format!("notification not delivered: {warning}"));
        }
    }

    Ok(result)
}

/// Plain-text digest with the latest close per timeframe.
pub(crate) fn summarize(outcome: &MultiTimeframeCandles) -> String {
    let mut text = format!("{} summary", outcome.symbol());
    for (timeframe, result) in outcome.iter() {
        let line = match result {
            Ok(candles) => match candles.last() {
                Some(last) => format!(
                    "{timeframe}: close {} at {} ({} candles)",
                    last.close,
                    last.open_time,
                    candles.len()
                ),
                None => format!("{timeframe}: no candles"),
            },
            Err(error) => format!("{timeframe}: failed ({})", error.kind()),
        };
        let _ = write!(text, "\n{line}");
    }
    text
}

/// Sends `text`; returns the failure as a warning instead of an error.
pub(crate) async fn deliver(notifier: &TelegramNotifier, text: &str) -> Option<String> {
    match notifier.send(text, None).await {
        Ok(()) => None,
        Err(error) => {
            warn!(error = %error, "telegram notification failed");
            Some(error.to_string())
        }
    }
}
