//! The scheduler: every connection, queue, and round event funnels through
//! [`Scheduler::dispatch`], one at a time.
//!
//! Handlers never await. Outbound messages go onto per-session unbounded
//! channels, so a slow client cannot hold up anyone else, and each event is
//! fully applied before the next one is looked at.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use turnstile_protocol::{
    ClientMessage, Direction, MovePhase, RoleClaim, ServerMessage, SessionId,
    normalize_display_name,
};
use turnstile_registry::{ConnectionRegistry, RegistryError, Role, SessionSender};

use crate::{
    Phase, Requester, RoundConfig, RoundId, RoundLifecycle, SchedulerError,
    SettleCause, Settlement, TimerFired, TurnQueue,
};

/// Reason sent with the close frame when a second resource tries to bind.
const RESOURCE_TAKEN: &str = "resource already connected";

/// Everything the scheduler reacts to.
#[derive(Debug)]
pub enum Event {
    /// A transport session opened. `outbox` feeds its writer.
    Connect {
        session: SessionId,
        outbox: SessionSender,
    },
    Register {
        session: SessionId,
        role: RoleClaim,
    },
    Join {
        session: SessionId,
        display_name: String,
    },
    Move {
        session: SessionId,
        direction: Direction,
        phase: MovePhase,
    },
    EndTurn {
        session: SessionId,
    },
    ReportFinalScore {
        session: SessionId,
        value: u64,
        user_id: Option<String>,
    },
    UpdateScore {
        session: SessionId,
        value: u64,
    },
    /// The transport session closed, for whatever reason.
    Disconnect {
        session: SessionId,
    },
    Timer(TimerFired),
}

impl Event {
    /// Wraps a decoded client message with the session it came from.
    pub fn from_client(session: SessionId, msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::Register { role } => Self::Register { session, role },
            ClientMessage::Join { display_name } => Self::Join {
                session,
                display_name,
            },
            ClientMessage::Move { direction, phase } => Self::Move {
                session,
                direction,
                phase,
            },
            ClientMessage::EndTurn => Self::EndTurn { session },
            ClientMessage::ReportFinalScore { value, user_id } => Self::ReportFinalScore {
                session,
                value,
                user_id,
            },
            ClientMessage::UpdateScore { value } => Self::UpdateScore { session, value },
        }
    }
}

/// A read-only view of scheduler state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub round: Option<RoundId>,
    pub phase: Phase,
    /// Session holding the game, if any.
    pub holder: Option<SessionId>,
    /// Waiting sessions, front first.
    pub queue: Vec<SessionId>,
    /// Session bound as resource owner, if any.
    pub resource: Option<SessionId>,
    /// Number of connected sessions.
    pub sessions: usize,
}

/// Owns the registry, the queue, and the round.
#[derive(Debug)]
pub struct Scheduler {
    registry: ConnectionRegistry,
    queue: TurnQueue,
    lifecycle: RoundLifecycle,
}

impl Scheduler {
    pub fn new(config: RoundConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            queue: TurnQueue::new(),
            lifecycle: RoundLifecycle::new(config),
        }
    }

    /// Applies one event.
    ///
    /// Rejected events change nothing and get no reply; they are logged at
    /// debug level.
    pub fn dispatch(&mut self, event: Event) {
        let result = match event {
            Event::Connect { session, outbox } => self.on_connect(session, outbox),
            Event::Register { session, role } => self.on_register(session, role),
            Event::Join {
                session,
                display_name,
            } => self.on_join(session, &display_name),
            Event::Move {
                session,
                direction,
                phase,
            } => self.on_move(session, direction, phase),
            Event::EndTurn { session } => self.on_end_turn(session),
            Event::ReportFinalScore {
                session,
                value,
                user_id,
            } => self.on_final_score(session, value, user_id.as_deref()),
            Event::UpdateScore { session, value } => self.on_score_update(session, value),
            Event::Disconnect { session } => self.on_disconnect(session),
            Event::Timer(fired) => self.on_timer(fired),
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "event dropped");
        }
    }

    /// Waits for the round's next timer. See [`RoundLifecycle::next_timer`].
    pub async fn next_timer(&mut self) -> TimerFired {
        self.lifecycle.next_timer().await
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round: self.lifecycle.round_id(),
            phase: self.lifecycle.phase(),
            holder: self.lifecycle.holder().map(|h| h.session),
            queue: self.queue.sessions(),
            resource: self.registry.resource_owner(),
            sessions: self.registry.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Connection events
    // -----------------------------------------------------------------------

    fn on_connect(&mut self, session: SessionId, outbox: SessionSender) -> Result<(), SchedulerError> {
        self.registry.connect(session, outbox)?;
        Ok(())
    }

    fn on_register(&mut self, session: SessionId, role: RoleClaim) -> Result<(), SchedulerError> {
        if let Err(e) = self.registry.register(session, role) {
            if let RegistryError::RoleConflict { existing } = &e {
                tracing::warn!(%session, %existing, "second resource rejected");
                self.registry.close(session, RESOURCE_TAKEN);
            }
            return Err(e.into());
        }

        let phase = self.lifecycle.phase();
        match Role::from(role) {
            Role::ResourceOwner => match (phase, self.lifecycle.holder()) {
                (Phase::Active, Some(holder)) => {
                    let player_name = holder.display_name.clone();
                    self.registry
                        .send(session, ServerMessage::RoundStart { player_name });
                }
                (Phase::Idle, _) => {
                    self.registry.send(session, ServerMessage::WaitingForPlayers);
                }
                _ => {}
            },
            _ => {
                self.registry.send(
                    session,
                    ServerMessage::ConnectionStatus {
                        is_active: !phase.is_idle(),
                    },
                );
            }
        }
        Ok(())
    }

    fn on_disconnect(&mut self, session: SessionId) -> Result<(), SchedulerError> {
        let role = self
            .registry
            .unregister(session)
            .ok_or(RegistryError::UnknownSession(session))?;

        if role.is_resource() {
            // Nobody is left to report a score, so a live or settling round
            // closes with the last pushed value. A preparing round carries
            // on and waits for the resource to come back.
            if matches!(self.lifecycle.phase(), Phase::Active | Phase::Settling) {
                self.settle_now(SettleCause::ResourceLeft);
            }
            return Ok(());
        }

        if self.lifecycle.is_holder(session) {
            self.settle_now(SettleCause::HolderLeft);
        } else if self.queue.remove(session).is_some() {
            tracing::info!(%session, waiting = self.queue.len(), "left the queue");
            self.notify_queue_positions();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Requester events
    // -----------------------------------------------------------------------

    fn on_join(&mut self, session: SessionId, display_name: &str) -> Result<(), SchedulerError> {
        match self.registry.role(session) {
            None => return Err(RegistryError::UnknownSession(session).into()),
            Some(Role::ResourceOwner) => return Err(SchedulerError::AlreadyBound(session)),
            Some(Role::Unclassified) => self.registry.register(session, RoleClaim::Requester)?,
            Some(Role::Requester) => {}
        }
        if self.lifecycle.is_holder(session) || self.queue.contains(session) {
            return Err(SchedulerError::AlreadyWaiting(session));
        }

        let requester = Requester::new(session, normalize_display_name(display_name));
        tracing::info!(%session, name = %requester.display_name, "join requested");

        if self.lifecycle.phase().is_idle() && self.queue.is_empty() {
            self.start_round(requester);
            return Ok(());
        }

        self.queue.enqueue(requester)?;
        if self.lifecycle.phase().is_idle() {
            self.advance();
        } else {
            self.notify_queue_positions();
        }
        Ok(())
    }

    fn on_move(
        &mut self,
        session: SessionId,
        direction: Direction,
        phase: MovePhase,
    ) -> Result<(), SchedulerError> {
        self.require_active_holder(session)?;
        self.registry
            .send_to_resource(ServerMessage::GameAction { direction, phase });
        Ok(())
    }

    fn on_end_turn(&mut self, session: SessionId) -> Result<(), SchedulerError> {
        let round = self.require_active_holder(session)?;
        tracing::info!(%session, %round, "turn ended early");
        self.conclude(round, SettleCause::EndedTurn);
        Ok(())
    }

    fn require_active_holder(&self, session: SessionId) -> Result<RoundId, SchedulerError> {
        match self.lifecycle.round_id() {
            Some(round) if self.lifecycle.phase().is_active() && self.lifecycle.is_holder(session) => {
                Ok(round)
            }
            _ => Err(SchedulerError::NotHolder(session)),
        }
    }

    // -----------------------------------------------------------------------
    // Resource events
    // -----------------------------------------------------------------------

    fn on_final_score(
        &mut self,
        session: SessionId,
        value: u64,
        user_id: Option<&str>,
    ) -> Result<(), SchedulerError> {
        if !self.registry.is_resource_owner(session) {
            return Err(SchedulerError::NotResource(session));
        }
        let settlement = self
            .lifecycle
            .settle_reported(value, user_id)
            .ok_or(SchedulerError::NoPendingSettlement)?;
        self.finish(settlement);
        Ok(())
    }

    fn on_score_update(&mut self, session: SessionId, value: u64) -> Result<(), SchedulerError> {
        if !self.registry.is_resource_owner(session) {
            return Err(SchedulerError::NotResource(session));
        }
        let holder = self
            .lifecycle
            .record_score(value)
            .ok_or(SchedulerError::NoActiveRound)?;
        self.registry.send(holder, ServerMessage::ScoreUpdate { value });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    fn on_timer(&mut self, fired: TimerFired) -> Result<(), SchedulerError> {
        if self.lifecycle.round_id() != Some(fired.round()) {
            return Err(SchedulerError::StaleTimer(fired));
        }
        match fired {
            TimerFired::PreparationElapsed(round) => self.enter_active(round),
            TimerFired::Tick(_) => {
                if let Some(remaining) = self.lifecycle.remaining() {
                    self.send_time_update(remaining);
                }
            }
            TimerFired::RoundElapsed(round) => {
                tracing::info!(%round, "round time is up");
                self.conclude(round, SettleCause::RoundElapsed);
            }
            TimerFired::ReportTimedOut(round) => {
                tracing::warn!(%round, "resource never reported a final score");
                self.settle_now(SettleCause::ReportTimedOut);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Idle → Preparing for `requester`.
    fn start_round(&mut self, requester: Requester) {
        let session = requester.session;
        let name = requester.display_name.clone();
        match self.lifecycle.prepare(requester) {
            Ok(round) => {
                tracing::info!(%round, %session, %name, "round preparing");
                let duration_ms = duration_ms(self.lifecycle.config().prepare_duration);
                self.registry
                    .send(session, ServerMessage::PrepareToPlay { duration_ms });
            }
            Err(busy) => {
                tracing::error!(error = %busy, %session, "cannot start round, requeueing");
                self.queue.requeue_front(busy.requester);
            }
        }
    }

    /// Preparing → Active.
    fn enter_active(&mut self, round: RoundId) {
        let Some(holder) = self.lifecycle.activate(round) else {
            return;
        };
        let session = holder.session;
        let player_name = holder.display_name.clone();
        tracing::info!(%round, %session, "round active");

        self.registry.send(session, ServerMessage::YourTurn);
        self.registry
            .send_to_resource(ServerMessage::RoundStart { player_name });
        self.send_time_update(self.lifecycle.config().round_duration);
    }

    /// Ends an active round: asks the resource for the final score if one is
    /// bound, otherwise settles right away.
    fn conclude(&mut self, round: RoundId, cause: SettleCause) {
        if self.registry.resource_owner().is_none() {
            self.settle_now(cause);
            return;
        }
        if let Some(holder) = self.lifecycle.await_report(round) {
            let user_id = holder.user_id.clone();
            tracing::debug!(%round, %user_id, "requesting final score");
            self.registry
                .send_to_resource(ServerMessage::RequestFinalScore { user_id });
        }
    }

    fn settle_now(&mut self, cause: SettleCause) {
        let settlement = self
            .lifecycle
            .round_id()
            .and_then(|round| self.lifecycle.settle_now(round, cause));
        if let Some(settlement) = settlement {
            self.finish(settlement);
        }
    }

    /// Delivers a settlement's results and hands the game to the next
    /// requester.
    fn finish(&mut self, settlement: Settlement) {
        let Settlement {
            round,
            requester,
            final_score,
            cause,
            played,
        } = settlement;
        tracing::info!(
            %round,
            session = %requester.session,
            final_score,
            %cause,
            "round settled"
        );

        self.registry
            .send(requester.session, ServerMessage::GameOver { final_score });
        if played {
            self.registry
                .send_to_resource(ServerMessage::RecordGameSession {
                    user_id: requester.user_id,
                    player_name: requester.display_name,
                    total_score: final_score,
                    timestamp: unix_millis(),
                });
        } else {
            tracing::debug!(%round, "round never went live, nothing to record");
        }

        self.advance();
    }

    /// Starts the next round from the queue, or goes idle.
    fn advance(&mut self) {
        match self.queue.dequeue_front() {
            Ok(next) => {
                self.start_round(next);
                self.notify_queue_positions();
            }
            Err(_) => {
                tracing::info!("queue empty, game available");
                self.registry
                    .send_to_resource(ServerMessage::WaitingForPlayers);
                self.registry.broadcast(ServerMessage::GameAvailable);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    fn notify_queue_positions(&self) {
        for p in self.queue.positions() {
            self.registry.send(
                p.requester.session,
                ServerMessage::QueueUpdate {
                    position: p.position,
                    total: p.total,
                },
            );
        }
    }

    fn send_time_update(&self, remaining: Duration) {
        if let Some(holder) = self.lifecycle.holder() {
            self.registry.send(
                holder.session,
                ServerMessage::TimeUpdate {
                    remaining_ms: duration_ms(remaining),
                },
            );
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or(0)
}

// =========================================================================
// Tests
// =========================================================================
