//! Phase timers for Turnstile.
//!
//! A round's phases are driven by two kinds of timer:
//!
//! - [`Deadline`]: one-shot. Fires once when its instant passes, then
//!   pends forever. Used for the preparation window, the round limit, and
//!   the score-report wait.
//! - [`Ticker`]: periodic. Used for the countdown pushed to the active
//!   player while the round is live.
//!
//! Neither spawns a task. Both are plain values polled from inside the
//! scheduler actor's `tokio::select!` loop, so dropping the value is the
//! cancellation:
//!
//! ```ignore
//! loop {
//!     let event = tokio::select! {
//!         Some(event) = inbox.recv() => event,
//!         fired = round.next_timer() => Event::Timer(fired),
//!     };
//!     scheduler.dispatch(event);
//! }
//! ```
//!
//! All instants are `tokio::time::Instant`, so tests can run under
//! `#[tokio::test(start_paused = true)]` and advance time deterministically.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Stand-in for "never" when a duration does not fit on the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `duration` from now, saturating at [`FAR_FUTURE`] instead of
/// overflowing the platform's `Instant`.
fn instant_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// A one-shot timer.
///
/// [`elapsed`](Self::elapsed) resolves once, the first time it is awaited
/// at or after the deadline. Every later call pends forever, so a deadline
/// that has already been acted on can never fire twice.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    armed: bool,
}

impl Deadline {
    /// A deadline `duration` from now. Durations too large for the clock
    /// land decades out.
    pub fn after(duration: Duration) -> Self {
        Self {
            at: instant_after(duration),
            armed: true,
        }
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Waits for the deadline, then disarms it.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// deadline armed.
    pub async fn elapsed(&mut self) {
        if !self.armed {
            std::future::pending::<()>().await;
        }
        time::sleep_until(self.at).await;
        self.armed = false;
        trace!("deadline elapsed");
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Configuration for a [`Ticker`].
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub interval: Duration,
}

impl TickConfig {
    /// Shortest interval a ticker will run at.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Raises an interval below [`Self::MIN_INTERVAL`] to the minimum.
    ///
    /// Called automatically by [`Ticker::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

/// A periodic timer. The first tick fires one interval after creation.
///
/// A tick that fires late does not trigger a burst of catch-up ticks: the
/// next one is scheduled a full interval after the late one, and the
/// missed ticks are logged.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    ticks: u64,
    next_tick: Instant,
}

impl Ticker {
    pub fn new(config: TickConfig) -> Self {
        let interval = config.validated().interval;
        debug!(interval_ms = interval.as_millis() as u64, "ticker started");
        Self {
            interval,
            ticks: 0,
            next_tick: instant_after(interval),
        }
    }

    /// Waits until the next tick is due.
    ///
    /// Cancel-safe: state only changes after the sleep completes, so a
    /// `select!` that picks another branch loses nothing.
    pub async fn wait_for_tick(&mut self) {
        let due = self.next_tick;
        time::sleep_until(due).await;

        let now = Instant::now();
        self.ticks += 1;

        let late_by = now.saturating_duration_since(due);
        let skipped = late_by.as_nanos() / self.interval.as_nanos();
        if skipped > 0 {
            warn!(
                tick = self.ticks,
                skipped = skipped as u64,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }
        self.next_tick = instant_after(self.interval);

        trace!(tick = self.ticks, "tick fired");
    }
}
