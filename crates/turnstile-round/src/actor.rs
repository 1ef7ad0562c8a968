//! Scheduler actor: a single Tokio task that owns the [`Scheduler`].
//!
//! Connection handlers talk to it through a cloneable [`SchedulerHandle`].
//! The task waits on its inbox and on the round's next timer at the same
//! time, so timer events are serialized with client events and never race
//! them.

use tokio::sync::{mpsc, oneshot};

use crate::{Event, RoundConfig, RoundSnapshot, Scheduler, SchedulerError};

/// Inbox capacity. Senders wait when it fills up.
const DEFAULT_CHANNEL_SIZE: usize = 256;

pub(crate) enum SchedulerCommand {
    Event(Event),
    Snapshot {
        reply: oneshot::Sender<RoundSnapshot>,
    },
    Shutdown,
}

/// Handle to the running scheduler. Cheap to clone.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Queues an event (fire-and-forget).
    pub async fn send(&self, event: Event) -> Result<(), SchedulerError> {
        self.sender
            .send(SchedulerCommand::Event(event))
            .await
            .map_err(|_| SchedulerError::Unavailable)
    }

    /// Reads the current state. Everything sent before this call has been
    /// applied by the time the snapshot is taken.
    pub async fn snapshot(&self) -> Result<RoundSnapshot, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| SchedulerError::Unavailable)?;
        reply_rx.await.map_err(|_| SchedulerError::Unavailable)
    }

    /// Stops the actor. Pending timers are dropped with it.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .map_err(|_| SchedulerError::Unavailable)
    }
}

struct SchedulerActor {
    scheduler: Scheduler,
    receiver: mpsc::Receiver<SchedulerCommand>,
}

impl SchedulerActor {
    async fn run(mut self) {
        tracing::info!("scheduler started");

        loop {
            let command = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
                fired = self.scheduler.next_timer() => SchedulerCommand::Event(Event::Timer(fired)),
            };

            match command {
                SchedulerCommand::Event(event) => self.scheduler.dispatch(event),
                SchedulerCommand::Snapshot { reply } => {
                    let _ = reply.send(self.scheduler.snapshot());
                }
                SchedulerCommand::Shutdown => break,
            }
        }

        tracing::info!("scheduler stopped");
    }
}

/// Spawns the scheduler actor and returns a handle to it.
///
/// Must be called from inside a Tokio runtime.
pub fn spawn_scheduler(config: RoundConfig) -> SchedulerHandle {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);

    let actor = SchedulerActor {
        scheduler: Scheduler::new(config),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    SchedulerHandle { sender: tx }
}
