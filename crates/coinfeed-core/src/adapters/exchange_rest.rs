use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{decode_error, parse_decimal, query_string, status_error, transport_error};
use crate::data_source::{
    CandlesRequest, CapabilitySet, DataSource, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::{Candle, ProviderId, Quote, Symbol, UtcDateTime};

const PROVIDER: &str = "binance";
const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Binance spot public REST adapter.
#[derive(Clone)]
pub struct ExchangeRestAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
}

impl Default for ExchangeRestAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl ExchangeRestAdapter {
    /// Maximum klines Binance returns per request.
    pub const PAGE_LIMIT: usize = 1000;

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(DEFAULT_BASE_URL),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    async fn get(&self, path: &str, query: String) -> Result<HttpResponse, SourceError> {
        let url = format!("{}{path}?{query}", self.base_url);
        debug!(provider = PROVIDER, %url, "issuing upstream request");

        let response = self
            .http_client
            .execute(HttpRequest::get(url))
            .await
            .map_err(|error| transport_error(PROVIDER, &error))?;

        if response.is_success() {
            return Ok(response);
        }

        if let Ok(api_error) = serde_json::from_str::<BinanceApiError>(&response.body) {
            if api_error.code == INVALID_SYMBOL_CODE {
                return Err(SourceError::not_found(format!(
                    "binance does not list this symbol: {}",
                    api_error.msg
                )));
            }
        }

        Err(status_error(PROVIDER, &response))
    }
}

impl DataSource for ExchangeRestAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::ExchangeRest
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn page_limit(&self) -> usize {
        Self::PAGE_LIMIT
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let query = query_string(&[("symbol", req.symbol.concatenated())]);
            let response = self.get("/api/v3/ticker/24hr", query).await?;
            let ticker: BinanceTicker = serde_json::from_str(&response.body)
                .map_err(|error| decode_error(PROVIDER, error))?;
            normalize_ticker(req.symbol, ticker)
        })
    }

    fn candles<'a>(&'a self, req: CandlesRequest) -> SourceFuture<'a, Vec<Candle>> {
        Box::pin(async move {
            let limit = req.limit.min(Self::PAGE_LIMIT);
            let mut params = vec![
                ("symbol", req.symbol.concatenated()),
                ("interval", req.timeframe.as_str().to_owned()),
                ("limit", limit.to_string()),
            ];
            if let Some(start) = req.start {
                params.push(("startTime", start.unix_millis().to_string()));
            }
            if let Some(end) = req.end {
                params.push(("endTime", end.unix_millis().to_string()));
            }

            let response = self.get("/api/v3/klines", query_string(&params)).await?;
            let rows: Vec<Vec<Value>> = serde_json::from_str(&response.body)
                .map_err(|error| decode_error(PROVIDER, error))?;

            let mut candles = Vec::with_capacity(rows.len());
            for row in &rows {
                match normalize_kline(row) {
                    Ok(candle) => candles.push(candle),
                    Err(error) => warn!(
                        provider = PROVIDER,
                        symbol = %req.symbol,
                        error = %error,
                        "skipping malformed kline row"
                    ),
                }
            }
            candles.sort_by_key(Candle::open_time_ms);
            Ok(candles)
        })
    }
}

#[derive(Debug, Deserialize)]
struct BinanceApiError {
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    last_price: String,
    #[serde(default)]
    bid_price: Option<String>,
    #[serde(default)]
    ask_price: Option<String>,
    #[serde(default)]
    high_price: Option<String>,
    #[serde(default)]
    low_price: Option<String>,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    price_change_percent: Option<String>,
    close_time: i64,
}

fn normalize_ticker(symbol: Symbol, ticker: BinanceTicker) -> Result<Quote, SourceError> {
    let optional = |field: &str, raw: &Option<String>| -> Result<Option<f64>, SourceError> {
        raw.as_deref()
            .map(|value| parse_decimal(PROVIDER, field, value))
            .transpose()
    };
    // Binance publishes "0.00000000" for an empty book side.
    let book_side = |field: &str, raw: &Option<String>| -> Result<Option<f64>, SourceError> {
        Ok(optional(field, raw)?.filter(|value| *value > 0.0))
    };

    let price = parse_decimal(PROVIDER, "lastPrice", &ticker.last_price)?;
    let bid = book_side("bidPrice", &ticker.bid_price)?;
    let ask = book_side("askPrice", &ticker.ask_price)?;
    let high = optional("highPrice", &ticker.high_price)?;
    let low = optional("lowPrice", &ticker.low_price)?;
    let volume = optional("volume", &ticker.volume)?;
    let change_pct = optional("priceChangePercent", &ticker.price_change_percent)?;
    let as_of = UtcDateTime::from_unix_millis(ticker.close_time)
        .map_err(|error| decode_error(PROVIDER, error))?;

    Quote::new(symbol, price, as_of, ProviderId::ExchangeRest)
        .and_then(|quote| quote.with_book(bid, ask))
        .and_then(|quote| quote.with_24h_range(high, low))
        .and_then(|quote| quote.with_24h_stats(volume, change_pct))
        .map_err(|error| decode_error(PROVIDER, error))
}

/// `[openTime, open, high, low, close, volume, closeTime, ...]`
fn normalize_kline(row: &[Value]) -> Result<Candle, SourceError> {
    if row.len() < 6 {
        return Err(decode_error(
            PROVIDER,
            format_args!("kline row has {} fields, expected at least 6", row.len()),
        ));
    }

    let open_time = row[0]
        .as_i64()
        .ok_or_else(|| decode_error(PROVIDER, "kline open time is not an integer"))?;
    let field = |index: usize, name: &str| -> Result<f64, SourceError> {
        match &row[index] {
            Value::String(raw) => parse_decimal(PROVIDER, name, raw),
            Value::Number(number) => number
                .as_f64()
                .ok_or_else(|| decode_error(PROVIDER, format_args!("field '{name}' overflows"))),
            _ => Err(decode_error(
                PROVIDER,
                format_args!("field '{name}' has unexpected type"),
            )),
        }
    };

    let open_time =
        UtcDateTime::from_unix_millis(open_time).map_err(|error| decode_error(PROVIDER, error))?;
    Candle::new(
        open_time,
        field(1, "open")?,
        field(2, "high")?,
        field(3, "low")?,
        field(4, "close")?,
        field(5, "volume")?,
    )
    .map_err(|error| decode_error(PROVIDER, error))
}
