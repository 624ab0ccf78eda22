#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use coinfeed_core::{
    is_strictly_ascending, AggregatorAdapter, BybitConnector, CandlesRequest, DataSource,
    ExchangeRestAdapter, FetchErrorKind, Fetcher, GenericExchangeAdapter, HttpClient,
    HttpResponse, ProviderId, QuoteRequest, SourceErrorKind, Timeframe,
};

use support::{at_ms, btc, fast_config, RoutedTransport, JAN_1_2024_MS};

const BINANCE_TICKER: &str = r#"{
    "symbol": "BTCUSDT",
    "priceChangePercent": "1.250",
    "lastPrice": "42500.10000000",
    "bidPrice": "42500.00000000",
    "askPrice": "42500.20000000",
    "highPrice": "43000.00000000",
    "lowPrice": "41000.00000000",
    "volume": "1834.20000000",
    "closeTime": 1704153599999
}"#;

const BINANCE_KLINES: &str = r#"[
    [1704067200000, "42283.58", "44184.10", "42180.77", "44179.55", "27174.29", 1704153599999, "1169532850.38", 1000, "14266.00", "613849262.84", "0"],
    [1704153600000, "44179.55", "45879.63", "44148.34", "44946.91", "65146.40", 1704239999999, "2926143212.86", 1000, "33207.29", "1491823393.12", "0"]
]"#;

const COINGECKO_PRICE: &str = r#"{"bitcoin":{"usd":42510.5,"usd_24h_vol":21000000000.0,"usd_24h_change":1.31,"last_updated_at":1704067200}}"#;

const BYBIT_TICKERS: &str = r#"{
    "retCode": 0,
    "retMsg": "OK",
    "result": {
        "category": "spot",
        "list": [{
            "symbol": "BTCUSDT",
            "bid1Price": "42499.9",
            "ask1Price": "42500.3",
            "lastPrice": "42500.1",
            "price24hPcnt": "0.0125",
            "highPrice24h": "43000",
            "lowPrice24h": "41000",
            "volume24h": "8123.5"
        }]
    },
    "time": 1704067200000
}"#;

const BYBIT_KLINES: &str = r#"{
    "retCode": 0,
    "retMsg": "OK",
    "result": {
        "category": "spot",
        "symbol": "BTCUSDT",
        "list": [
            ["1704153600000", "44179.55", "45879.63", "44148.34", "44946.91", "65146.40", "2926143212.86"],
            ["1704067200000", "42283.58", "44184.10", "42180.77", "44179.55", "27174.29", "1169532850.38"]
        ]
    },
    "time": 1704200000000
}"#;

struct ProviderCase {
    id: ProviderId,
    source: Arc<dyn DataSource>,
    transport: Arc<RoutedTransport>,
    supports_candles: bool,
    page_limit: usize,
}

fn ok(body: &str) -> Vec<HttpResponse> {
    vec![HttpResponse::ok_json(body)]
}

fn provider_cases() -> Vec<ProviderCase> {
    let binance = Arc::new(
        RoutedTransport::new()
            .route("/api/v3/ticker/24hr", ok(BINANCE_TICKER))
            .route("/api/v3/klines", ok(BINANCE_KLINES)),
    );
    let coingecko = Arc::new(RoutedTransport::new().route("/simple/price", ok(COINGECKO_PRICE)));
    let bybit = Arc::new(
        RoutedTransport::new()
            .route("/v5/market/tickers", ok(BYBIT_TICKERS))
            .route("/v5/market/kline", ok(BYBIT_KLINES)),
    );

    vec![
        ProviderCase {
            id: ProviderId::ExchangeRest,
            source: Arc::new(ExchangeRestAdapter::with_http_client(binance.clone())),
            transport: binance,
            supports_candles: true,
            page_limit: 1000,
        },
        ProviderCase {
            id: ProviderId::Aggregator,
            source: Arc::new(AggregatorAdapter::with_http_client(coingecko.clone())),
            transport: coingecko,
            supports_candles: false,
            page_limit: 0,
        },
        ProviderCase {
            id: ProviderId::GenericExchange,
            source: Arc::new(GenericExchangeAdapter::with_connector(Arc::new(
                BybitConnector::with_http_client(bybit.clone()),
            ))),
            transport: bybit,
            supports_candles: true,
            page_limit: 1000,
        },
    ]
}

#[tokio::test]
async fn quote_is_normalized_for_every_provider() {
    for case in provider_cases() {
        let quote = case
            .source
            .quote(QuoteRequest::new(btc()))
            .await
            .unwrap_or_else(|error| panic!("provider '{}' quote failed: {error}", case.id));

        assert_eq!(quote.symbol, btc(), "provider '{}': symbol", case.id);
        assert!(quote.price > 0.0, "provider '{}': price must be positive", case.id);
        assert_eq!(quote.source, case.id, "provider '{}': source", case.id);
        assert!(
            quote.change_24h_pct.is_some_and(|pct| pct > 1.0 && pct < 1.5),
            "provider '{}': change is a percentage",
            case.id
        );
        assert_eq!(case.transport.requests().len(), 1, "provider '{}': one call", case.id);
    }
}

#[tokio::test]
async fn book_top_is_reported_only_where_published() {
    for case in provider_cases() {
        let quote = case
            .source
            .quote(QuoteRequest::new(btc()))
            .await
            .expect("quote");
        let has_book = quote.bid.is_some() && quote.ask.is_some();
        assert_eq!(
            has_book,
            case.source.capabilities().book_top,
            "provider '{}': bid/ask vs capability",
            case.id
        );
    }
}

#[tokio::test]
async fn candles_are_ascending_or_unsupported() {
    for case in provider_cases() {
        let request = CandlesRequest::new(btc(), Timeframe::OneDay, 2)
            .expect("request")
            .with_start(at_ms(JAN_1_2024_MS));

        let result = case.source.candles(request).await;
        assert_eq!(
            case.source.capabilities().candles,
            case.supports_candles,
            "provider '{}': capability",
            case.id
        );

        if case.supports_candles {
            let candles = result
                .unwrap_or_else(|error| panic!("provider '{}' candles failed: {error}", case.id));
            assert_eq!(candles.len(), 2, "provider '{}': candle count", case.id);
            assert!(is_strictly_ascending(&candles), "provider '{}': order", case.id);
            assert_eq!(candles[0].open_time_ms(), JAN_1_2024_MS);
        } else {
            let error = result.expect_err("candles must be unsupported");
            assert_eq!(error.kind(), SourceErrorKind::Unsupported);
            assert!(case.transport.requests().is_empty(), "no network call");
        }
    }
}

#[test]
fn page_limits_match_provider_ceilings() {
    for case in provider_cases() {
        assert_eq!(case.source.page_limit(), case.page_limit, "provider '{}'", case.id);
        assert_eq!(case.source.id(), case.id);
    }
}

#[tokio::test]
async fn throttling_status_is_classified_as_rate_limited() {
    let throttled = || vec![HttpResponse::new(429, "slow down")];
    let sources: Vec<(ProviderId, Arc<dyn DataSource>)> = vec![
        (
            ProviderId::ExchangeRest,
            Arc::new(ExchangeRestAdapter::with_http_client(Arc::new(
                RoutedTransport::new().route("/api/", throttled()),
            ))),
        ),
        (
            ProviderId::Aggregator,
            Arc::new(AggregatorAdapter::with_http_client(Arc::new(
                RoutedTransport::new().route("/api/", throttled()),
            ))),
        ),
        (
            ProviderId::GenericExchange,
            Arc::new(GenericExchangeAdapter::with_connector(Arc::new(
                BybitConnector::with_http_client(Arc::new(
                    RoutedTransport::new().route("/v5/", throttled()),
                )),
            ))),
        ),
    ];

    for (id, source) in sources {
        let error = source
            .quote(QuoteRequest::new(btc()))
            .await
            .expect_err("throttled");
        assert_eq!(error.kind(), SourceErrorKind::RateLimited, "provider '{id}'");
        assert!(error.retryable());
    }
}

#[tokio::test]
async fn server_errors_are_transient_and_client_errors_are_not() {
    let transport = Arc::new(
        RoutedTransport::new()
            .route("/api/v3/ticker/24hr", vec![HttpResponse::new(503, "maintenance")])
            .route("/api/v3/klines", vec![HttpResponse::new(400, r#"{"code":-1100,"msg":"Illegal characters"}"#)]),
    );
    let adapter = ExchangeRestAdapter::with_http_client(transport);

    let quote_error = adapter
        .quote(QuoteRequest::new(btc()))
        .await
        .expect_err("503");
    assert_eq!(quote_error.kind(), SourceErrorKind::Transient);

    let request = CandlesRequest::new(btc(), Timeframe::OneDay, 2).expect("request");
    let candle_error = adapter.candles(request).await.expect_err("400");
    assert_eq!(candle_error.kind(), SourceErrorKind::InvalidRequest);
    assert!(!candle_error.retryable());
}

#[tokio::test]
async fn fetcher_drives_the_real_adapter_through_an_injected_transport() {
    let transport = Arc::new(
        RoutedTransport::new().route(
            "/api/v3/ticker/24hr",
            vec![
                HttpResponse::new(502, "bad gateway"),
                HttpResponse::ok_json(BINANCE_TICKER),
            ],
        ),
    );
    let fetcher = Fetcher::builder(fast_config(ProviderId::ExchangeRest, 3))
        .with_http_client(transport.clone() as Arc<dyn HttpClient>)
        .build();

    let quote = fetcher.realtime_price(&btc()).await.expect("quote after retry");

    assert_eq!(quote.price, 42_500.1);
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.ends_with("/api/v3/ticker/24hr?symbol=BTCUSDT"));
}

#[tokio::test]
async fn aggregator_fetcher_rejects_candles_before_any_request() {
    let transport = Arc::new(RoutedTransport::new());
    let fetcher = Fetcher::builder(fast_config(ProviderId::Aggregator, 3))
        .with_http_client(transport.clone() as Arc<dyn HttpClient>)
        .build();

    let error = fetcher
        .historical_candles(&btc(), Timeframe::OneDay, 10, None)
        .await
        .expect_err("unsupported");

    assert_eq!(error.kind(), FetchErrorKind::Unsupported);
    assert!(transport.requests().is_empty());
}
