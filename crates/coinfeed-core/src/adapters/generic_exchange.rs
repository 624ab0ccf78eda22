use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{decode_error, parse_decimal, query_string, status_error, transport_error};
use crate::data_source::{
    CandlesRequest, CapabilitySet, DataSource, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::{Candle, ProviderId, Quote, Symbol, Timeframe, UtcDateTime};

/// Exchange-specific transport behind [`GenericExchangeAdapter`].
///
/// Connectors translate one exchange's public market-data API. They report
/// their own page ceiling and return candles in ascending open-time order.
pub trait ExchangeConnector: Send + Sync {
    /// Short exchange name used in logs and error messages.
    fn name(&self) -> &'static str;

    fn page_limit(&self) -> usize;

    /// Whether tickers include best bid/ask.
    fn has_book_top(&self) -> bool;

    fn ticker<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote>;

    fn ohlcv<'a>(&'a self, req: &'a CandlesRequest) -> SourceFuture<'a, Vec<Candle>>;
}

/// Adapter that delegates to a pluggable [`ExchangeConnector`].
#[derive(Clone)]
pub struct GenericExchangeAdapter {
    connector: Arc<dyn ExchangeConnector>,
}

impl Default for GenericExchangeAdapter {
    fn default() -> Self {
        Self::with_connector(Arc::new(BybitConnector::default()))
    }
}

impl GenericExchangeAdapter {
    pub fn with_connector(connector: Arc<dyn ExchangeConnector>) -> Self {
        Self { connector }
    }

    pub fn connector_name(&self) -> &'static str {
        self.connector.name()
    }
}

impl DataSource for GenericExchangeAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::GenericExchange
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, true, self.connector.has_book_top())
    }

    fn page_limit(&self) -> usize {
        self.connector.page_limit()
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(async move { self.connector.ticker(&req.symbol).await })
    }

    fn candles<'a>(&'a self, mut req: CandlesRequest) -> SourceFuture<'a, Vec<Candle>> {
        Box::pin(async move {
            req.limit = req.limit.min(self.connector.page_limit()).max(1);
            self.connector.ohlcv(&req).await
        })
    }
}

const BYBIT: &str = "bybit";
const BYBIT_BASE_URL: &str = "https://api.bybit.com";
const BYBIT_PAGE_LIMIT: usize = 1000;

/// Bybit v5 spot market-data connector.
#[derive(Clone)]
pub struct BybitConnector {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
}

impl Default for BybitConnector {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl BybitConnector {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(BYBIT_BASE_URL),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    async fn get<T>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<BybitReply<T>, SourceError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{path}?{}", self.base_url, query_string(params));
        debug!(provider = BYBIT, %url, "issuing upstream request");

        let response = self
            .http_client
            .execute(HttpRequest::get(url))
            .await
            .map_err(|error| transport_error(BYBIT, &error))?;

        if !response.is_success() {
            return Err(status_error(BYBIT, &response));
        }

        let envelope: BybitEnvelope<T> =
            serde_json::from_str(&response.body).map_err(|error| decode_error(BYBIT, error))?;

        if envelope.ret_code != 0 {
            return Err(bybit_error(envelope.ret_code, &envelope.ret_msg));
        }

        let result = envelope
            .result
            .ok_or_else(|| decode_error(BYBIT, "missing result object"))?;
        Ok(BybitReply {
            result,
            server_time_ms: envelope.time,
        })
    }
}

impl ExchangeConnector for BybitConnector {
    fn name(&self) -> &'static str {
        BYBIT
    }

    fn page_limit(&self) -> usize {
        BYBIT_PAGE_LIMIT
    }

    fn has_book_top(&self) -> bool {
        true
    }

    fn ticker<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let reply: BybitReply<BybitList<BybitTicker>> = self
                .get(
                    "/v5/market/tickers",
                    &[
                        ("category", String::from("spot")),
                        ("symbol", symbol.concatenated()),
                    ],
                )
                .await?;

            let as_of = match reply.server_time_ms {
                Some(ms) => {
                    UtcDateTime::from_unix_millis(ms).map_err(|error| decode_error(BYBIT, error))?
                }
                None => UtcDateTime::now(),
            };
            let ticker = reply.result.list.into_iter().next().ok_or_else(|| {
                SourceError::not_found(format!("bybit returned no ticker for {symbol}"))
            })?;
            normalize_ticker(symbol.clone(), ticker, as_of)
        })
    }

    fn ohlcv<'a>(&'a self, req: &'a CandlesRequest) -> SourceFuture<'a, Vec<Candle>> {
        Box::pin(async move {
            let limit = req.limit.min(BYBIT_PAGE_LIMIT);
            let mut params = vec![
                ("category", String::from("spot")),
                ("symbol", req.symbol.concatenated()),
                ("interval", bybit_interval(req.timeframe).to_owned()),
                ("limit", limit.to_string()),
            ];

            // Bybit returns the newest rows of a range, so an open-ended start is
            // closed off at exactly `limit` candles.
            let end = match (req.start, req.end) {
                (_, Some(end)) => Some(end.unix_millis()),
                (Some(start), None) => Some(
                    start.unix_millis()
                        + req.timeframe.duration_ms() * (limit.saturating_sub(1) as i64),
                ),
                (None, None) => None,
            };
            if let Some(start) = req.start {
                params.push(("start", start.unix_millis().to_string()));
            }
            if let Some(end) = end {
                params.push(("end", end.to_string()));
            }

            let result = self
                .get::<BybitList<Vec<String>>>("/v5/market/kline", &params)
                .await?
                .result;

            let mut candles = Vec::with_capacity(result.list.len());
            for row in &result.list {
                match normalize_kline(row) {
                    Ok(candle) => candles.push(candle),
                    Err(error) => warn!(
                        provider = BYBIT,
                        symbol = %req.symbol,
                        error = %error,
                        "skipping malformed kline row"
                    ),
                }
            }
            // Bybit lists newest first.
            candles.reverse();
            candles.sort_by_key(Candle::open_time_ms);
            Ok(candles)
        })
    }
}

fn bybit_interval(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::OneMinute => "1",
        Timeframe::FiveMinutes => "5",
        Timeframe::FifteenMinutes => "15",
        Timeframe::ThirtyMinutes => "30",
        Timeframe::OneHour => "60",
        Timeframe::FourHours => "240",
        Timeframe::OneDay => "D",
        Timeframe::OneWeek => "W",
    }
}

fn bybit_error(code: i64, message: &str) -> SourceError {
    let detail = format!("bybit retCode {code}: {message}");
    match code {
        10006 | 10018 => SourceError::rate_limited(detail),
        170121 => SourceError::not_found(detail),
        _ if message.to_ascii_lowercase().contains("symbol") => SourceError::not_found(detail),
        _ => SourceError::transient(detail),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitEnvelope<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<T>,
    /// Server time in unix ms.
    #[serde(default)]
    time: Option<i64>,
}

struct BybitReply<T> {
    result: T,
    server_time_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BybitList<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitTicker {
    last_price: String,
    #[serde(default)]
    bid1_price: Option<String>,
    #[serde(default)]
    ask1_price: Option<String>,
    #[serde(default)]
    high_price24h: Option<String>,
    #[serde(default)]
    low_price24h: Option<String>,
    #[serde(default)]
    volume24h: Option<String>,
    /// Fraction, not percent.
    #[serde(default)]
    price24h_pcnt: Option<String>,
}

fn normalize_ticker(
    symbol: Symbol,
    ticker: BybitTicker,
    as_of: UtcDateTime,
) -> Result<Quote, SourceError> {
    let optional = |field: &str, raw: &Option<String>| -> Result<Option<f64>, SourceError> {
        raw.as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_decimal(BYBIT, field, value))
            .transpose()
    };

    let price = parse_decimal(BYBIT, "lastPrice", &ticker.last_price)?;
    let bid = optional("bid1Price", &ticker.bid1_price)?.filter(|value| *value > 0.0);
    let ask = optional("ask1Price", &ticker.ask1_price)?.filter(|value| *value > 0.0);
    let high = optional("highPrice24h", &ticker.high_price24h)?;
    let low = optional("lowPrice24h", &ticker.low_price24h)?;
    let volume = optional("volume24h", &ticker.volume24h)?;
    let change_pct = optional("price24hPcnt", &ticker.price24h_pcnt)?.map(|value| value * 100.0);

    Quote::new(symbol, price, as_of, ProviderId::GenericExchange)
        .and_then(|quote| quote.with_book(bid, ask))
        .and_then(|quote| quote.with_24h_range(high, low))
        .and_then(|quote| quote.with_24h_stats(volume, change_pct))
        .map_err(|error| decode_error(BYBIT, error))
}

/// `[startTime, open, high, low, close, volume, turnover]`, all strings.
fn normalize_kline(row: &[String]) -> Result<Candle, SourceError> {
    if row.len() < 6 {
        return Err(decode_error(
            BYBIT,
            format_args!("kline row has {} fields, expected 7", row.len()),
        ));
    }

    let start_ms = row[0]
        .parse::<i64>()
        .map_err(|_| decode_error(BYBIT, format_args!("invalid start time '{}'", row[0])))?;
    let open_time =
        UtcDateTime::from_unix_millis(start_ms).map_err(|error| decode_error(BYBIT, error))?;

    Candle::new(
        open_time,
        parse_decimal(BYBIT, "open", &row[1])?,
        parse_decimal(BYBIT, "high", &row[2])?,
        parse_decimal(BYBIT, "low", &row[3])?,
        parse_decimal(BYBIT, "close", &row[4])?,
        parse_decimal(BYBIT, "volume", &row[5])?,
    )
    .map_err(|error| decode_error(BYBIT, error))
}
