use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{decode_error, query_string, status_error, transport_error};
use crate::data_source::{
    CandlesRequest, CapabilitySet, DataSource, Endpoint, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::{Candle, ProviderId, Quote, UtcDateTime};

const PROVIDER: &str = "coingecko";
const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";
const DEMO_KEY_HEADER: &str = "x-cg-demo-api-key";

const COIN_IDS: [(&str, &str); 10] = [
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("BNB", "binancecoin"),
    ("SOL", "solana"),
    ("ADA", "cardano"),
    ("XRP", "ripple"),
    ("DOT", "polkadot"),
    ("DOGE", "dogecoin"),
    ("AVAX", "avalanche-2"),
    ("MATIC", "matic-network"),
];

/// CoinGecko coin id for a base asset; unknown assets fall back to the lowercased ticker.
pub fn coin_id_for(base: &str) -> String {
    COIN_IDS
        .iter()
        .find(|(ticker, _)| ticker.eq_ignore_ascii_case(base))
        .map(|(_, id)| (*id).to_owned())
        .unwrap_or_else(|| base.to_ascii_lowercase())
}

/// CoinGecko `vs_currency` for a quote asset. Dollar stablecoins price in `usd`.
pub fn vs_currency_for(quote: &str) -> String {
    match quote.to_ascii_uppercase().as_str() {
        "USDT" | "USDC" | "BUSD" | "USD" => String::from("usd"),
        other => other.to_ascii_lowercase(),
    }
}

/// CoinGecko simple-price adapter. Quotes only; no OHLC history.
#[derive(Clone)]
pub struct AggregatorAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
}

impl Default for AggregatorAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl AggregatorAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(DEFAULT_BASE_URL),
            auth: HttpAuth::None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Sends the demo-tier API key with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.auth = HttpAuth::Header {
            name: String::from(DEMO_KEY_HEADER),
            value: api_key.into(),
        };
        self
    }
}

impl DataSource for AggregatorAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Aggregator
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, false, false)
    }

    fn page_limit(&self) -> usize {
        0
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let coin_id = coin_id_for(req.symbol.base());
            let vs_currency = vs_currency_for(req.symbol.quote());
            let query = query_string(&[
                ("ids", coin_id.clone()),
                ("vs_currencies", vs_currency.clone()),
                ("include_24hr_change", String::from("true")),
                ("include_24hr_vol", String::from("true")),
                ("include_last_updated_at", String::from("true")),
            ]);
            let url = format!("{}/api/v3/simple/price?{query}", self.base_url);
            debug!(provider = PROVIDER, %url, "issuing upstream request");

            let request = HttpRequest::get(url).with_auth(&self.auth);
            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|error| transport_error(PROVIDER, &error))?;

            if !response.is_success() {
                return Err(status_error(PROVIDER, &response));
            }

            let mut prices: HashMap<String, HashMap<String, Option<f64>>> =
                serde_json::from_str(&response.body)
                    .map_err(|error| decode_error(PROVIDER, error))?;

            let fields = prices.remove(&coin_id).ok_or_else(|| {
                SourceError::not_found(format!("coingecko has no coin id '{coin_id}'"))
            })?;
            let field = |name: String| fields.get(&name).copied().flatten();

            let price = field(vs_currency.clone()).ok_or_else(|| {
                SourceError::not_found(format!(
                    "coingecko has no '{vs_currency}' price for '{coin_id}'"
                ))
            })?;
            let as_of = match field(String::from("last_updated_at")) {
                Some(seconds) => UtcDateTime::from_unix_seconds(seconds as i64)
                    .map_err(|error| decode_error(PROVIDER, error))?,
                None => UtcDateTime::now(),
            };

            Quote::new(req.symbol, price, as_of, ProviderId::Aggregator)
                .and_then(|quote| {
                    quote.with_24h_stats(
                        field(format!("{vs_currency}_24h_vol")),
                        field(format!("{vs_currency}_24h_change")),
                    )
                })
                .map_err(|error| decode_error(PROVIDER, error))
        })
    }

    fn candles<'a>(&'a self, req: CandlesRequest) -> SourceFuture<'a, Vec<Candle>> {
        Box::pin(async move {
            let _ = req;
            Err(SourceError::unsupported(Endpoint::Candles, ProviderId::Aggregator))
        })
    }
}
