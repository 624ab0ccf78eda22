//! Window planning and merge for histories longer than one page.
//!
//! A request for `count` candles ending at `end` is split into
//! `ceil(count / page_size)` windows. Window `i` covers the `page_size`
//! candles immediately older than window `i - 1`; the last window only covers
//! the remainder. Windows are aligned to the timeframe grid, so adjacent
//! windows never overlap unless the provider returns extra edge rows.

use std::collections::BTreeMap;

use crate::{Candle, Timeframe};

/// One time-bounded sub-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub index: usize,
    /// Open time of the oldest candle in the window (inclusive).
    pub start_ms: i64,
    /// Open time of the newest candle in the window (inclusive).
    pub end_ms: i64,
    pub limit: usize,
}

/// Backward walk from an anchor candle in steps of `page_size` candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    anchor_ms: i64,
    step_ms: i64,
    page_size: usize,
    count: usize,
}

impl WindowPlan {
    /// `end_ms` is floored to the open time of the candle containing it, on
    /// the timeframe's own grid (weekly windows are Monday aligned).
    pub fn new(timeframe: Timeframe, end_ms: i64, count: usize, page_size: usize) -> Self {
        Self {
            anchor_ms: timeframe.floor_ms(end_ms),
            step_ms: timeframe.duration_ms(),
            page_size: page_size.max(1),
            count,
        }
    }

    /// Open time of the newest candle the plan can return.
    pub fn anchor_ms(&self) -> i64 {
        self.anchor_ms
    }

    pub fn window_count(&self) -> usize {
        self.count.div_ceil(self.page_size)
    }

    /// Window `index`, or `None` past the end of the plan or before the unix epoch.
    pub fn window(&self, index: usize) -> Option<Window> {
        if index >= self.window_count() {
            return None;
        }

        let planned = index * self.page_size;
        let limit = self.page_size.min(self.count - planned);
        let end_ms = self.anchor_ms - self.step_ms * planned as i64;
        if end_ms < 0 {
            return None;
        }
        let start_ms = (end_ms - self.step_ms * (limit as i64 - 1)).max(0);

        Some(Window {
            index,
            start_ms,
            end_ms,
            limit,
        })
    }

    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        (0..self.window_count()).map_while(|index| self.window(index))
    }
}

/// Accumulates pages keyed by open time; later duplicates replace earlier ones.
#[derive(Debug, Default)]
pub struct CandleMerger {
    by_open_time: BTreeMap<i64, Candle>,
    upper_bound_ms: Option<i64>,
}

impl CandleMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops candles opening after `upper_bound_ms`.
    pub fn with_upper_bound(upper_bound_ms: i64) -> Self {
        Self {
            by_open_time: BTreeMap::new(),
            upper_bound_ms: Some(upper_bound_ms),
        }
    }

    /// Adds a page and returns how many previously unseen open times it contributed.
    pub fn extend(&mut self, page: impl IntoIterator<Item = Candle>) -> usize {
        let before = self.by_open_time.len();
        for candle in page {
            let open_ms = candle.open_time_ms();
            if self.upper_bound_ms.is_some_and(|bound| open_ms > bound) {
                continue;
            }
            self.by_open_time.insert(open_ms, candle);
        }
        self.by_open_time.len() - before
    }

    pub fn len(&self) -> usize {
        self.by_open_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_open_time.is_empty()
    }

    /// The newest `count` candles in ascending open-time order.
    pub fn into_newest(self, count: usize) -> Vec<Candle> {
        let skip = self.by_open_time.len().saturating_sub(count);
        self.by_open_time.into_values().skip(skip).collect()
    }
}
