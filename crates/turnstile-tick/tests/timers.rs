//! Integration tests for deadlines and the countdown ticker.
//!
//! Every async test runs with `start_paused = true`: the clock only moves
//! when the runtime is idle, so sleeps resolve without real waiting.

use std::time::Duration;

use tokio::time::Instant;
use turnstile_tick::{Deadline, TickConfig, Ticker};

/// Timers resolve on millisecond boundaries; allow for rounding up.
fn assert_elapsed(since: Instant, expected: Duration) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(2),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

fn ticker(interval: Duration) -> Ticker {
    Ticker::new(TickConfig::with_interval(interval))
}

// =========================================================================
// Deadline
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_deadline_fires_at_its_instant() {
    let start = Instant::now();
    let mut deadline = Deadline::after(Duration::from_secs(5));

    deadline.elapsed().await;

    assert_elapsed(start, Duration::from_secs(5));
    assert_eq!(deadline.remaining(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_fires_only_once() {
    let mut deadline = Deadline::after(Duration::from_millis(100));
    deadline.elapsed().await;

    let again = tokio::time::timeout(Duration::from_secs(60), deadline.elapsed()).await;
    assert!(again.is_err(), "a fired deadline must pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_deadline_remaining_counts_down() {
    let deadline = Deadline::after(Duration::from_secs(10));
    assert_eq!(deadline.remaining(), Duration::from_secs(10));

    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(deadline.remaining(), Duration::from_secs(6));

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(deadline.remaining(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_huge_duration_saturates() {
    let deadline = Deadline::after(Duration::MAX);

    assert!(deadline.remaining() > Duration::from_secs(86_400 * 365));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_wait_keeps_original_instant() {
    let start = Instant::now();
    let mut deadline = Deadline::after(Duration::from_secs(10));

    // Losing a select! race drops the elapsed() future mid-sleep.
    tokio::select! {
        _ = deadline.elapsed() => panic!("deadline should not win"),
        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
    }

    deadline.elapsed().await;
    assert_elapsed(start, Duration::from_secs(10));
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_validated_clamps_tiny_interval() {
    let cfg = TickConfig::with_interval(Duration::ZERO).validated();
    assert_eq!(cfg.interval, TickConfig::MIN_INTERVAL);
}

// =========================================================================
// Ticker
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticker_first_tick_after_one_interval() {
    let start = Instant::now();
    let mut ticker = ticker(Duration::from_secs(1));

    ticker.wait_for_tick().await;

    assert_elapsed(start, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_ticker_keeps_steady_cadence() {
    let start = Instant::now();
    let mut ticker = ticker(Duration::from_millis(250));

    for _ in 0..4 {
        ticker.wait_for_tick().await;
    }

    assert_elapsed(start, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_ticker_late_tick_does_not_burst() {
    let mut ticker = ticker(Duration::from_secs(1));

    // Stall the actor for 3.5 intervals past the first due tick.
    tokio::time::advance(Duration::from_millis(4500)).await;
    ticker.wait_for_tick().await;

    // Next tick is one interval from now, not a run of catch-ups.
    let before = Instant::now();
    ticker.wait_for_tick().await;
    assert_elapsed(before, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_ticker_wait_is_cancel_safe() {
    let start = Instant::now();
    let mut ticker = ticker(Duration::from_secs(1));

    tokio::select! {
        _ = ticker.wait_for_tick() => panic!("tick should not win"),
        _ = tokio::time::sleep(Duration::from_millis(400)) => {}
    }

    ticker.wait_for_tick().await;
    assert_elapsed(start, Duration::from_secs(1));
}
