//! The single round: who holds the game, which phase it is in, and the
//! timers that move it along.
//!
//! Each phase owns its timers. Leaving a phase replaces the stage value and
//! the old [`Deadline`] or [`Ticker`] is dropped with it, so a timer from a
//! finished phase has nothing left to fire. Every [`TimerFired`] also
//! carries the [`RoundId`] it was armed for; the scheduler ignores any that
//! no longer match.

use std::fmt;
use std::time::Duration;

use turnstile_protocol::SessionId;
use turnstile_tick::{Deadline, TickConfig, Ticker};

use crate::{Phase, Requester, RoundBusy, RoundConfig};

/// Identity of one round. Strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(pub u64);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round-{}", self.0)
    }
}

/// A phase timer that went off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    /// The preparation window is over; controls go live.
    PreparationElapsed(RoundId),
    /// Countdown tick during the active phase.
    Tick(RoundId),
    /// The round hit its time limit.
    RoundElapsed(RoundId),
    /// The resource never answered `requestFinalScore`.
    ReportTimedOut(RoundId),
}

impl TimerFired {
    /// The round this timer was armed for.
    pub fn round(&self) -> RoundId {
        match *self {
            Self::PreparationElapsed(id)
            | Self::Tick(id)
            | Self::RoundElapsed(id)
            | Self::ReportTimedOut(id) => id,
        }
    }
}

/// What ended a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleCause {
    /// The resource answered `requestFinalScore`.
    Reported,
    /// Time ran out with no resource to ask.
    RoundElapsed,
    /// The holder ended the turn with no resource to ask.
    EndedTurn,
    /// The resource disconnected mid-round.
    ResourceLeft,
    /// The holder disconnected.
    HolderLeft,
    /// The resource was asked but never answered.
    ReportTimedOut,
}

impl fmt::Display for SettleCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reported => "reported",
            Self::RoundElapsed => "round elapsed",
            Self::EndedTurn => "ended turn",
            Self::ResourceLeft => "resource left",
            Self::HolderLeft => "holder left",
            Self::ReportTimedOut => "report timed out",
        };
        f.write_str(s)
    }
}

/// The outcome of a settled round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub round: RoundId,
    pub requester: Requester,
    pub final_score: u64,
    pub cause: SettleCause,
    /// Whether the holder ever had live controls. A round settled while
    /// still preparing has nothing worth recording.
    pub played: bool,
}

#[derive(Debug)]
enum Stage {
    Preparing { deadline: Deadline },
    Active { deadline: Deadline, ticker: Ticker },
    Settling { deadline: Deadline },
}

#[derive(Debug)]
struct Round {
    id: RoundId,
    holder: Requester,
    stage: Stage,
}

/// At most one round, driven through its phases.
///
/// All transitions are checked: a call that does not apply to the current
/// phase or round changes nothing and says so through its return value.
#[derive(Debug)]
pub struct RoundLifecycle {
    config: RoundConfig,
    next_id: u64,
    current: Option<Round>,
}

impl RoundLifecycle {
    pub fn new(config: RoundConfig) -> Self {
        Self {
            config: config.validated(),
            next_id: 1,
            current: None,
        }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        match &self.current {
            None => Phase::Idle,
            Some(round) => match round.stage {
                Stage::Preparing { .. } => Phase::Preparing,
                Stage::Active { .. } => Phase::Active,
                Stage::Settling { .. } => Phase::Settling,
            },
        }
    }

    pub fn round_id(&self) -> Option<RoundId> {
        self.current.as_ref().map(|r| r.id)
    }

    pub fn holder(&self) -> Option<&Requester> {
        self.current.as_ref().map(|r| &r.holder)
    }

    pub fn is_holder(&self, session: SessionId) -> bool {
        self.holder().is_some_and(|h| h.session == session)
    }

    /// Time left before the current phase's deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.current.as_ref().map(|r| match &r.stage {
            Stage::Preparing { deadline }
            | Stage::Active { deadline, .. }
            | Stage::Settling { deadline } => deadline.remaining(),
        })
    }

    /// Idle → Preparing for `holder`.
    ///
    /// # Errors
    /// [`RoundBusy`] with the requester handed back if a round is already
    /// in progress.
    pub fn prepare(&mut self, holder: Requester) -> Result<RoundId, RoundBusy> {
        if let Some(round) = &self.current {
            return Err(RoundBusy {
                round: round.id,
                phase: self.phase(),
                requester: holder,
            });
        }

        let id = RoundId(self.next_id);
        self.next_id += 1;
        self.current = Some(Round {
            id,
            holder,
            stage: Stage::Preparing {
                deadline: Deadline::after(self.config.prepare_duration),
            },
        });
        Ok(id)
    }

    /// Preparing → Active. Starts the round clock and the countdown ticker.
    ///
    /// Returns the holder, or `None` if `round` is not the one preparing.
    pub fn activate(&mut self, round: RoundId) -> Option<&Requester> {
        let current = self.current.as_mut().filter(|r| r.id == round)?;
        if !matches!(current.stage, Stage::Preparing { .. }) {
            return None;
        }
        current.stage = Stage::Active {
            deadline: Deadline::after(self.config.round_duration),
            ticker: Ticker::new(TickConfig::with_interval(self.config.tick_interval)),
        };
        Some(&current.holder)
    }

    /// Active → Settling. Starts the report timeout.
    ///
    /// Returns the holder, or `None` if `round` is not the one active.
    pub fn await_report(&mut self, round: RoundId) -> Option<&Requester> {
        let current = self.current.as_mut().filter(|r| r.id == round)?;
        if !matches!(current.stage, Stage::Active { .. }) {
            return None;
        }
        current.stage = Stage::Settling {
            deadline: Deadline::after(self.config.report_timeout),
        };
        Some(&current.holder)
    }

    /// Records the resource's running score. Only counts while active.
    pub fn record_score(&mut self, value: u64) -> Option<SessionId> {
        let current = self.current.as_mut()?;
        if !matches!(current.stage, Stage::Active { .. }) {
            return None;
        }
        current.holder.score = value;
        Some(current.holder.session)
    }

    /// Settles the round awaiting a report with the reported score.
    ///
    /// If `user_id` is given it must name the holder. Returns `None` when
    /// no round is awaiting a report or the id does not match, which is
    /// also what every call after the first returns.
    pub fn settle_reported(&mut self, value: u64, user_id: Option<&str>) -> Option<Settlement> {
        let current = self.current.as_ref()?;
        if !matches!(current.stage, Stage::Settling { .. }) {
            return None;
        }
        if user_id.is_some_and(|id| id != current.holder.user_id) {
            return None;
        }
        let round = self.current.take()?;
        Some(Settlement {
            round: round.id,
            final_score: value,
            requester: round.holder,
            cause: SettleCause::Reported,
            played: true,
        })
    }

    /// Settles `round` now, from any phase, with the holder's last-known
    /// score.
    ///
    /// Returns `None` if `round` is not current, so a second settlement of
    /// the same round is a no-op.
    pub fn settle_now(&mut self, round: RoundId, cause: SettleCause) -> Option<Settlement> {
        if self.round_id() != Some(round) {
            return None;
        }
        let round = self.current.take()?;
        let played = !matches!(round.stage, Stage::Preparing { .. });
        Some(Settlement {
            round: round.id,
            final_score: round.holder.score,
            requester: round.holder,
            cause,
            played,
        })
    }

    /// Waits for the current phase's next timer.
    ///
    /// Pends forever while idle. Cancel-safe, so it can sit in a
    /// `select!` next to the inbox.
    pub async fn next_timer(&mut self) -> TimerFired {
        let Some(round) = self.current.as_mut() else {
            return std::future::pending().await;
        };
        let id = round.id;
        match &mut round.stage {
            Stage::Preparing { deadline } => {
                deadline.elapsed().await;
                TimerFired::PreparationElapsed(id)
            }
            Stage::Active { deadline, ticker } => {
                tokio::select! {
                    biased;
                    _ = deadline.elapsed() => TimerFired::RoundElapsed(id),
                    _ = ticker.wait_for_tick() => TimerFired::Tick(id),
                }
            }
            Stage::Settling { deadline } => {
                deadline.elapsed().await;
                TimerFired::ReportTimedOut(id)
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
