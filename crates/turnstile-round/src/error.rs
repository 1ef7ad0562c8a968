//! Error types for the round layer.

use turnstile_protocol::SessionId;
use turnstile_registry::RegistryError;

use crate::{Phase, Requester, RoundId, TimerFired};

/// Errors from [`TurnQueue`](crate::TurnQueue) operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    /// Nobody is waiting.
    #[error("queue is empty")]
    Empty,

    /// The session already has a place in line.
    #[error("session {0} is already queued")]
    AlreadyQueued(SessionId),
}

/// A round could not start because one is already in progress.
///
/// Hands the requester back so the caller can keep its place.
#[derive(Debug, thiserror::Error)]
#[error("round {round} is already {phase}")]
pub struct RoundBusy {
    pub round: RoundId,
    pub phase: Phase,
    pub requester: Requester,
}

/// Why the scheduler dropped an event.
///
/// None of these reach the client. The scheduler logs them and carries on;
/// the only error with a visible effect is a resource [`RoleConflict`],
/// which closes the losing session.
///
/// [`RoleConflict`]: RegistryError::RoleConflict
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The resource session tried to join the queue.
    #[error("session {0} is bound to the resource and cannot join")]
    AlreadyBound(SessionId),

    /// The session is already holding or waiting for the game.
    #[error("session {0} is already playing or waiting")]
    AlreadyWaiting(SessionId),

    /// Control input from someone other than the active holder.
    #[error("session {0} does not hold the game")]
    NotHolder(SessionId),

    /// A resource-only message from some other session.
    #[error("session {0} is not the resource")]
    NotResource(SessionId),

    /// A score report with no round waiting for one, or for the wrong
    /// round.
    #[error("no round is awaiting a score report")]
    NoPendingSettlement,

    /// A score update outside the active phase.
    #[error("no round is active")]
    NoActiveRound,

    /// A timer for a round that has already moved on.
    #[error("stale timer {0:?}")]
    StaleTimer(TimerFired),

    /// The scheduler actor has stopped.
    #[error("scheduler is unavailable")]
    Unavailable,
}
