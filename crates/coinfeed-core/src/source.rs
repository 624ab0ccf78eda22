use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers; each selects one adapter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    /// Exchange public REST API (Binance spot).
    ExchangeRest,
    /// Market-data aggregator (CoinGecko).
    Aggregator,
    /// Pluggable exchange connector (Bybit by default).
    GenericExchange,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::ExchangeRest, Self::Aggregator, Self::GenericExchange];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExchangeRest => "exchange-rest",
            Self::Aggregator => "aggregator",
            Self::GenericExchange => "generic-exchange",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exchange-rest" | "binance" => Ok(Self::ExchangeRest),
            "aggregator" | "coingecko" => Ok(Self::Aggregator),
            "generic-exchange" | "ccxt" => Ok(Self::GenericExchange),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}
