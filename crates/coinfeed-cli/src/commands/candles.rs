use std::str::FromStr;

use coinfeed_core::{export_series, Fetcher, Timeframe, UtcDateTime};
use serde_json::json;
use tracing::info;

use crate::cli::{CandlesArgs, Cli};
use crate::error::CliError;

use super::{parse_symbol, CommandResult};

pub async fn run(
    args: &CandlesArgs,
    cli: &Cli,
    fetcher: &Fetcher,
) -> Result<CommandResult, CliError> {
    let symbol = parse_symbol(&args.symbol, cli)?;
    let timeframe = Timeframe::from_str(&args.timeframe)?;
    let end_time = args.end.as_deref().map(UtcDateTime::parse).transpose()?;

    let series = fetcher
        .historical_series(&symbol, timeframe, args.count, end_time)
        .await?;

    let mut warnings = Vec::new();
    if series.len() < args.count {
        warnings.push(format!(
            "provider returned {} of {} requested candles",
            series.len(),
            args.count
        ));
    }

    let data = match &args.output {
        Some(path) => {
            export_series(path, &series)?;
            info!(path = %path.display(), rows = series.len(), "wrote candles");
            json!({
                "symbol": series.symbol,
                "timeframe": series.timeframe,
                "provider": series.provider,
                "rows": series.len(),
                "first": series.first().map(|candle| candle.open_time),
                "last": series.last().map(|candle| candle.open_time),
                "output": path.display().to_string(),
            })
        }
        None => serde_json::to_value(&series)?,
    };

    let mut result = CommandResult::ok(data, fetcher.provider());
    for warning in warnings {
        result = result.with_warning(warning);
    }
    Ok(result)
}
