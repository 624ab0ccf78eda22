mod candles;
mod multi;
mod notify;
mod price;

use std::time::{Duration, Instant};

use coinfeed_core::{Backoff, Fetcher, FetcherConfig, FetchError, ProviderId, Symbol};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::ReportError;

#[derive(Debug)]
pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<ReportError>,
    pub latency_ms: u64,
    pub provider: ProviderId,
}

impl CommandResult {
    pub fn ok(data: Value, provider: ProviderId) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            provider,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<ReportError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let started = Instant::now();

    let result = match &cli.command {
        Command::Price(args) => price::run(args, cli, &build_fetcher(cli)).await?,
        Command::Candles(args) => candles::run(args, cli, &build_fetcher(cli)).await?,
        Command::Multi(args) => multi::run(args, cli, &build_fetcher(cli)).await?,
        Command::Notify(args) => notify::run(args, cli.provider.into()).await?,
    };

    Ok(result.with_latency(elapsed_ms(started)))
}

/// Assembles the fetcher configuration from provider defaults plus flag overrides.
pub fn fetcher_config(cli: &Cli) -> FetcherConfig {
    let mut config = FetcherConfig::for_provider(cli.provider.into());

    if let Some(page_size) = cli.page_size {
        config = config.with_page_size(page_size);
    }
    if let Some(spacing_ms) = cli.spacing_ms {
        config = config.with_min_call_spacing(Duration::from_millis(spacing_ms));
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_call_timeout(Duration::from_millis(timeout_ms));
    }

    let mut retry = config.retry.clone();
    if let Some(max_attempts) = cli.max_attempts {
        retry.max_attempts = max_attempts.max(1);
    }
    if let Backoff::Exponential { base, max, .. } = &mut retry.backoff {
        if let Some(base_ms) = cli.backoff_base_ms {
            *base = Duration::from_millis(base_ms);
        }
        if let Some(cap_ms) = cli.backoff_cap_ms {
            *max = Duration::from_millis(cap_ms);
        }
    }
    config.with_retry(retry)
}

fn build_fetcher(cli: &Cli) -> Fetcher {
    let mut builder = Fetcher::builder(fetcher_config(cli));
    if let Some(api_key) = std::env::var("COINFEED_COINGECKO_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
    {
        builder = builder.with_aggregator_api_key(api_key);
    }
    builder.build()
}

pub(crate) fn parse_symbol(raw: &str, cli: &Cli) -> Result<Symbol, CliError> {
    Symbol::parse_or_quote(raw, &cli.quote_asset).map_err(CliError::from)
}

pub(crate) fn report_error(error: &FetchError, subject: impl Into<String>) -> ReportError {
    ReportError {
        code: error.code().to_owned(),
        message: error.to_string(),
        subject: Some(subject.into()),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
