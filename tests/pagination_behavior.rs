mod support;

use std::sync::Arc;

use coinfeed_core::pagination::WindowPlan;
use coinfeed_core::{is_strictly_ascending, Fetcher, ProviderId, Timeframe};

use support::{at_ms, btc, fast_config, fetcher_for, ScriptedSource, JAN_1_2024_MS};

const HOUR_MS: i64 = 3_600_000;
// Half past the hour: the newest candle is the one opening at 00:00.
const END_MS: i64 = JAN_1_2024_MS + 30 * 60_000;

fn limits(source: &ScriptedSource) -> Vec<usize> {
    source.candle_requests().iter().map(|req| req.limit).collect()
}

#[tokio::test]
async fn request_within_page_ceiling_makes_one_call() {
    let source = Arc::new(ScriptedSource::new(1000));
    let fetcher = fetcher_for(source.clone(), 3);

    let candles = fetcher
        .historical_candles(&btc(), Timeframe::OneHour, 1000, Some(at_ms(END_MS)))
        .await
        .expect("candles");

    assert_eq!(candles.len(), 1000);
    assert_eq!(source.candle_calls(), 1);
    let request = &source.candle_requests()[0];
    assert_eq!(request.limit, 1000);
    assert!(request.start.is_none());
    assert_eq!(candles.last().map(|c| c.open_time_ms()), Some(JAN_1_2024_MS));
}

#[tokio::test]
async fn exact_multiple_of_page_size_takes_that_many_windows() {
    let source = Arc::new(ScriptedSource::new(1000));
    let fetcher = fetcher_for(source.clone(), 3);

    let candles = fetcher
        .historical_candles(&btc(), Timeframe::OneHour, 3000, Some(at_ms(END_MS)))
        .await
        .expect("candles");

    assert_eq!(source.candle_calls(), 3);
    assert_eq!(limits(&source), vec![1000, 1000, 1000]);
    assert_eq!(candles.len(), 3000);
    assert!(is_strictly_ascending(&candles));
    assert_eq!(candles[0].open_time_ms(), JAN_1_2024_MS - 2999 * HOUR_MS);
    assert_eq!(candles[2999].open_time_ms(), JAN_1_2024_MS);
}

#[tokio::test]
async fn remainder_window_is_trimmed_to_what_is_still_needed() {
    let source = Arc::new(ScriptedSource::new(1000));
    let fetcher = fetcher_for(source.clone(), 3);

    let candles = fetcher
        .historical_candles(&btc(), Timeframe::OneHour, 2500, Some(at_ms(END_MS)))
        .await
        .expect("candles");

    assert_eq!(source.candle_calls(), 3);
    assert_eq!(limits(&source), vec![1000, 1000, 500]);
    assert_eq!(candles.len(), 2500);
    assert!(is_strictly_ascending(&candles));
}

#[tokio::test]
async fn windows_walk_backwards_without_gaps_or_overlap() {
    let source = Arc::new(ScriptedSource::new(1000));
    let fetcher = fetcher_for(source.clone(), 3);

    fetcher
        .historical_candles(&btc(), Timeframe::OneHour, 2500, Some(at_ms(END_MS)))
        .await
        .expect("candles");

    let requests = source.candle_requests();
    assert_eq!(
        requests[0].end.map(|end| end.unix_millis()),
        Some(JAN_1_2024_MS)
    );
    for pair in requests.windows(2) {
        let newer_start = pair[0].start.expect("start").unix_millis();
        let older_end = pair[1].end.expect("end").unix_millis();
        assert_eq!(older_end, newer_start - HOUR_MS);
    }
}

#[tokio::test]
async fn overlapping_pages_are_deduplicated() {
    let source = Arc::new(ScriptedSource::new(1000).with_overlap(7));
    let fetcher = fetcher_for(source.clone(), 3);

    let candles = fetcher
        .historical_candles(&btc(), Timeframe::OneHour, 2500, Some(at_ms(END_MS)))
        .await
        .expect("candles");

    assert_eq!(candles.len(), 2500);
    assert!(is_strictly_ascending(&candles));
    assert_eq!(candles[2499].open_time_ms(), JAN_1_2024_MS);
}

#[tokio::test]
async fn empty_window_ends_the_walk_early() {
    let earliest = JAN_1_2024_MS - 1599 * HOUR_MS;
    let source = Arc::new(ScriptedSource::new(1000).with_history_from(earliest));
    let fetcher = fetcher_for(source.clone(), 3);

    let candles = fetcher
        .historical_candles(&btc(), Timeframe::OneHour, 5000, Some(at_ms(END_MS)))
        .await
        .expect("short history is not an error");

    // full page, short page, empty page; windows four and five are never requested
    assert_eq!(source.candle_calls(), 3);
    assert_eq!(candles.len(), 1600);
    assert_eq!(candles[0].open_time_ms(), earliest);
}

#[tokio::test]
async fn weekly_history_is_gapless_across_window_boundaries() {
    let week = Timeframe::OneWeek.duration_ms();
    // Weekly candles open on Monday; the epoch is a Thursday.
    let source = Arc::new(ScriptedSource::new(100).with_grid_offset(4 * 24 * HOUR_MS));
    let fetcher = fetcher_for(source.clone(), 3);

    // 2024-01-01 is a Monday, so the newest candle opens exactly at the end time.
    let candles = fetcher
        .historical_candles(&btc(), Timeframe::OneWeek, 300, Some(at_ms(JAN_1_2024_MS)))
        .await
        .expect("candles");

    assert_eq!(source.candle_calls(), 3);
    assert_eq!(limits(&source), vec![100, 100, 100]);
    assert_eq!(candles.len(), 300);
    assert_eq!(candles.last().map(|c| c.open_time_ms()), Some(JAN_1_2024_MS));
    assert_eq!(candles[0].open_time_ms(), JAN_1_2024_MS - 299 * week);
    for pair in candles.windows(2) {
        assert_eq!(pair[1].open_time_ms() - pair[0].open_time_ms(), week);
    }
}

#[tokio::test]
async fn page_size_override_shrinks_windows() {
    let source = Arc::new(ScriptedSource::new(1000));
    let fetcher = Fetcher::builder(fast_config(ProviderId::ExchangeRest, 3).with_page_size(400))
        .with_source(source.clone())
        .build();

    let candles = fetcher
        .historical_candles(&btc(), Timeframe::OneDay, 1000, Some(at_ms(END_MS)))
        .await
        .expect("candles");

    assert_eq!(fetcher.page_size(), 400);
    assert_eq!(limits(&source), vec![400, 400, 200]);
    assert_eq!(candles.len(), 1000);
}

#[tokio::test]
async fn oversized_override_is_clamped_to_the_ceiling() {
    let source = Arc::new(ScriptedSource::new(500));
    let fetcher = Fetcher::builder(fast_config(ProviderId::ExchangeRest, 3).with_page_size(5000))
        .with_source(source.clone())
        .build();

    fetcher
        .historical_candles(&btc(), Timeframe::FiveMinutes, 1200, Some(at_ms(END_MS)))
        .await
        .expect("candles");

    assert_eq!(limits(&source), vec![500, 500, 200]);
}

#[test]
fn plan_covers_count_with_ceil_division() {
    let plan = WindowPlan::new(Timeframe::OneDay, END_MS, 2500, 1000);
    let windows = plan.windows().collect::<Vec<_>>();

    assert_eq!(plan.window_count(), 3);
    assert_eq!(
        windows.iter().map(|w| w.limit).collect::<Vec<_>>(),
        vec![1000, 1000, 500]
    );
    assert_eq!(windows[0].end_ms, JAN_1_2024_MS);
    assert_eq!(
        windows.iter().map(|w| w.limit).sum::<usize>(),
        2500
    );
}
