//! Provider adapters.
//!
//! | Adapter | Provider | Upstream |
//! |---------|----------|----------|
//! | [`ExchangeRestAdapter`] | `exchange-rest` | Binance spot REST |
//! | [`AggregatorAdapter`] | `aggregator` | CoinGecko simple price |
//! | [`GenericExchangeAdapter`] | `generic-exchange` | any [`ExchangeConnector`], Bybit by default |

mod aggregator;
mod exchange_rest;
mod generic_exchange;

pub use aggregator::{coin_id_for, vs_currency_for, AggregatorAdapter};
pub use exchange_rest::ExchangeRestAdapter;
pub use generic_exchange::{BybitConnector, ExchangeConnector, GenericExchangeAdapter};

use crate::data_source::SourceError;
use crate::http_client::{HttpError, HttpResponse};

/// Classifies a non-success HTTP status.
pub(crate) fn status_error(provider: &str, response: &HttpResponse) -> SourceError {
    let message = format!(
        "{provider} upstream returned status {}: {}",
        response.status,
        body_excerpt(&response.body)
    );
    match response.status {
        429 | 418 => SourceError::rate_limited(message),
        404 => SourceError::not_found(message),
        408 | 500..=599 => SourceError::transient(message),
        400..=499 => SourceError::invalid_request(message),
        _ => SourceError::transient(message),
    }
}

pub(crate) fn transport_error(provider: &str, error: &HttpError) -> SourceError {
    if error.timed_out() {
        SourceError::transient(format!("{provider} request timed out: {}", error.message()))
    } else {
        SourceError::transient(format!("{provider} transport error: {}", error.message()))
    }
}

pub(crate) fn decode_error(provider: &str, error: impl std::fmt::Display) -> SourceError {
    SourceError::transient(format!("failed to decode {provider} response: {error}"))
}

pub(crate) fn parse_decimal(provider: &str, field: &str, raw: &str) -> Result<f64, SourceError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| decode_error(provider, format_args!("field '{field}' is not a number: '{raw}'")))
}

/// Builds `key=value&...` with percent-encoded values.
pub(crate) fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn body_excerpt(body: &str) -> &str {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((index, _)) => &trimmed[..index],
        None => trimmed,
    }
}
