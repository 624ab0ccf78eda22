//! CLI argument definitions for coinfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `price` | Realtime quotes for one or more symbols |
//! | `candles` | Historical OHLCV candles, optionally exported to CSV |
//! | `multi` | Candles for several timeframes with partial-success reporting |
//! | `notify` | Send a Telegram message |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--provider` | `exchange-rest` | Upstream provider |
//! | `--page-size` | provider ceiling | Candles per upstream call |
//! | `--spacing-ms` | provider policy | Minimum spacing between calls |
//! | `--max-attempts` | provider policy | Total attempts per call |
//! | `--backoff-base-ms` | provider policy | First retry delay |
//! | `--backoff-cap-ms` | provider policy | Maximum retry delay |
//! | `--timeout-ms` | provider policy | Per-call timeout |
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--quote-asset` | `USDT` | Quote asset for bare symbols |
//!
//! # Examples
//!
//! ```bash
//! coinfeed price BTC ETH/USDT
//! coinfeed candles BTC --timeframe 1h --count 2500 --output btc_1h.csv
//! coinfeed --provider generic-exchange multi SOL --timeframes 1h,4h,1d --count 50
//! coinfeed notify "BTC crossed 70k"
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use coinfeed_core::ProviderId;

/// Provider-neutral crypto market data CLI
#[derive(Debug, Parser)]
#[command(
    name = "coinfeed",
    author,
    version,
    about = "Provider-neutral crypto market data CLI",
    long_about = "coinfeed fetches spot quotes and OHLCV candles from Binance, CoinGecko \
or a generic exchange connector behind one interface. Histories longer than a provider \
page are fetched in windows, rate limited and retried with backoff.\n\
\n\
Logs go to stderr; set RUST_LOG=debug to see every upstream call."
)]
pub struct Cli {
    /// Upstream provider.
    #[arg(long, global = true, value_enum, default_value_t = ProviderArg::ExchangeRest)]
    pub provider: ProviderArg,

    /// Candles per upstream call, clamped to the provider ceiling.
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    /// Minimum spacing between upstream calls in milliseconds (0 disables).
    #[arg(long, global = true)]
    pub spacing_ms: Option<u64>,

    /// Total attempts per upstream call, including the first.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry in milliseconds; doubles on each retry.
    #[arg(long, global = true)]
    pub backoff_base_ms: Option<u64>,

    /// Upper bound on the retry delay in milliseconds.
    #[arg(long, global = true)]
    pub backoff_cap_ms: Option<u64>,

    /// Per-call timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Quote asset appended to bare symbols such as `BTC`.
    #[arg(long, global = true, default_value = "USDT")]
    pub quote_asset: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// Binance spot REST API.
    ExchangeRest,
    /// CoinGecko (quotes only).
    Aggregator,
    /// Generic exchange connector (Bybit).
    GenericExchange,
}

impl From<ProviderArg> for ProviderId {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::ExchangeRest => ProviderId::ExchangeRest,
            ProviderArg::Aggregator => ProviderId::Aggregator,
            ProviderArg::GenericExchange => ProviderId::GenericExchange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format for terminal display.
    Table,
    /// Single JSON object output.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch realtime quotes.
    ///
    /// Each symbol is fetched independently; failures are reported per symbol.
    ///
    ///   coinfeed price BTC ETH SOL/USDC
    Price(PriceArgs),

    /// Fetch historical candles.
    ///
    ///   coinfeed candles BTC --timeframe 1d --count 365
    ///   coinfeed candles ETH --timeframe 1h --count 3000 --end 2024-06-01T00:00:00Z --output eth.csv
    Candles(CandlesArgs),

    /// Fetch candles for several timeframes; one failing timeframe does not abort the rest.
    ///
    ///   coinfeed multi BTC --timeframes 1h,4h,1d --count 20 --notify
    Multi(MultiArgs),

    /// Send a Telegram message.
    ///
    /// Credentials come from --token/--chat-id or COINFEED_TELEGRAM_BOT_TOKEN /
    /// COINFEED_TELEGRAM_CHAT_ID (TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID also work).
    /// Without a message argument the text is read from stdin.
    Notify(NotifyArgs),
}

#[derive(Debug, Args)]
pub struct PriceArgs {
    /// One or more symbols (BTC, BTC/USDT).
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CandlesArgs {
    /// Symbol to fetch (BTC, BTC/USDT).
    pub symbol: String,

    /// Candle timeframe: 1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w.
    #[arg(long, default_value = "1d")]
    pub timeframe: String,

    /// Number of candles to fetch.
    #[arg(long, default_value_t = 100)]
    pub count: usize,

    /// Newest candle time, RFC3339 UTC (default: now).
    #[arg(long)]
    pub end: Option<String>,

    /// Write candles to this CSV file instead of printing them.
    #[arg(long)]
    pub output: Option<std::path::PathBuf>,
}

#[derive(Debug, Args)]
pub struct MultiArgs {
    /// Symbol to fetch (BTC, BTC/USDT).
    pub symbol: String,

    /// Comma-separated timeframes.
    #[arg(long, value_delimiter = ',', default_value = "1h,4h,1d")]
    pub timeframes: Vec<String>,

    /// Candles per timeframe.
    #[arg(long, default_value_t = 20)]
    pub count: usize,

    /// Push a summary to Telegram; delivery failures are warnings.
    #[arg(long, default_value_t = false)]
    pub notify: bool,
}

#[derive(Debug, Args)]
pub struct NotifyArgs {
    /// Message text. Read from stdin when omitted.
    pub message: Option<String>,

    /// Override the bot token.
    #[arg(long)]
    pub token: Option<String>,

    /// Override the chat id.
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Telegram parse mode (Markdown, MarkdownV2, HTML).
    #[arg(long)]
    pub parse_mode: Option<String>,
}
