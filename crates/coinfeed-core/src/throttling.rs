use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::ProviderId;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum spacing between outbound calls.
///
/// Clones share the same limiter, so every holder observes the same clock.
#[derive(Clone)]
pub struct RateGate {
    limiter: Option<Arc<DirectRateLimiter>>,
    spacing: Duration,
}

impl RateGate {
    /// A gate admitting one call per `spacing`. Zero spacing disables the gate.
    pub fn new(spacing: Duration) -> Self {
        let limiter = Quota::with_period(spacing)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Self { limiter, spacing }
    }

    pub fn disabled() -> Self {
        Self {
            limiter: None,
            spacing: Duration::ZERO,
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Waits until the next call is allowed.
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// True when both gates share one clock.
    pub fn shares_clock_with(&self, other: &Self) -> bool {
        match (&self.limiter, &other.limiter) {
            (Some(left), Some(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("spacing", &self.spacing)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Process-wide map of provider to [`RateGate`].
///
/// Fetchers built from the same registry and targeting the same provider share
/// spacing, even when they run concurrently.
#[derive(Debug, Clone, Default)]
pub struct ThrottleRegistry {
    gates: Arc<Mutex<HashMap<ProviderId, RateGate>>>,
}

impl ThrottleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the gate registered for `provider`, creating it with `spacing` on
    /// first use. Later callers inherit the spacing of the first registration.
    pub fn gate_for(&self, provider: ProviderId, spacing: Duration) -> RateGate {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        let gate = gates
            .entry(provider)
            .or_insert_with(|| RateGate::new(spacing));

        if gate.spacing() != spacing {
            debug!(
                provider = %provider,
                registered_ms = gate.spacing().as_millis() as u64,
                requested_ms = spacing.as_millis() as u64,
                "reusing existing rate gate with different spacing"
            );
        }

        gate.clone()
    }

    pub fn len(&self) -> usize {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
