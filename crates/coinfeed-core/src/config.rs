use std::time::Duration;

use crate::provider_policy::ProviderPolicy;
use crate::retry::RetryConfig;
use crate::ProviderId;

/// Explicit configuration handed to a [`Fetcher`](crate::Fetcher).
///
/// Nothing here is read from the environment; callers assemble it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetcherConfig {
    pub provider: ProviderId,
    /// Caps the page size below the adapter ceiling. Clamped to `1..=ceiling`.
    pub page_size_override: Option<usize>,
    /// Minimum spacing between calls to the provider. Zero disables spacing.
    pub min_call_spacing: Duration,
    pub retry: RetryConfig,
    /// Upper bound on one adapter call; exceeding it counts as a transient failure.
    pub call_timeout: Duration,
}

impl FetcherConfig {
    pub fn for_provider(provider: ProviderId) -> Self {
        let policy = ProviderPolicy::default_for(provider);
        Self {
            provider,
            page_size_override: None,
            min_call_spacing: policy.min_call_spacing,
            retry: policy.retry_backoff.to_retry_config(),
            call_timeout: policy.call_timeout,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size_override = Some(page_size);
        self
    }

    pub fn with_min_call_spacing(mut self, spacing: Duration) -> Self {
        self.min_call_spacing = spacing;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Page size to use given the adapter's ceiling.
    pub fn effective_page_size(&self, ceiling: usize) -> usize {
        match self.page_size_override {
            Some(_) if ceiling == 0 => 0,
            Some(size) => size.clamp(1, ceiling),
            None => ceiling,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::for_provider(ProviderId::ExchangeRest)
    }
}
