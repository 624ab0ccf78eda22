use std::time::Duration;

use crate::retry::{Backoff, RetryConfig};
use crate::ProviderId;

/// Default call discipline for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    /// Page ceiling, or `None` when the adapter reports its own.
    pub page_limit: Option<usize>,
    pub min_call_spacing: Duration,
    pub call_timeout: Duration,
    pub retry_backoff: BackoffPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.max_attempts,
            Backoff::Exponential {
                base: self.initial_delay,
                factor: self.multiplier,
                max: self.max_delay,
                jitter: false,
            },
        )
    }
}

impl ProviderPolicy {
    /// Binance spot: 1000 klines per page, generous weight budget.
    pub fn exchange_rest_default() -> Self {
        Self {
            provider_id: ProviderId::ExchangeRest,
            page_limit: Some(1000),
            min_call_spacing: Duration::from_millis(100),
            call_timeout: Duration::from_secs(10),
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
                max_attempts: 4,
            },
        }
    }

    /// CoinGecko public tier tolerates roughly 30 calls per minute.
    pub fn aggregator_default() -> Self {
        Self {
            provider_id: ProviderId::Aggregator,
            page_limit: None,
            min_call_spacing: Duration::from_secs(2),
            call_timeout: Duration::from_secs(10),
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(60),
                multiplier: 2.0,
                max_attempts: 4,
            },
        }
    }

    pub fn generic_exchange_default() -> Self {
        Self {
            provider_id: ProviderId::GenericExchange,
            page_limit: None,
            min_call_spacing: Duration::from_millis(100),
            call_timeout: Duration::from_secs(10),
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
                max_attempts: 4,
            },
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::ExchangeRest => Self::exchange_rest_default(),
            ProviderId::Aggregator => Self::aggregator_default(),
            ProviderId::GenericExchange => Self::generic_exchange_default(),
        }
    }
}
