//! Turn rotation for Turnstile.
//!
//! One live game, many players, one player at a time. This crate decides
//! who holds the game, for how long, and what happens when anyone
//! disappears mid-round.
//!
//! # Key types
//!
//! - [`TurnQueue`]: FIFO waiting list of [`Requester`]s
//! - [`RoundLifecycle`]: the single round and its phase timers
//! - [`Scheduler`]: owns registry, queue, and round; one `dispatch` per [`Event`]
//! - [`SchedulerHandle`]: send events to the running scheduler actor
//! - [`Phase`]: `Idle → Preparing → Active → Settling → (Preparing | Idle)`
//! - [`RoundConfig`]: phase durations

mod actor;
mod config;
mod error;
mod lifecycle;
mod queue;
mod requester;
mod scheduler;

pub use actor::{SchedulerHandle, spawn_scheduler};
pub use config::{Phase, RoundConfig};
pub use error::{QueueError, RoundBusy, SchedulerError};
pub use lifecycle::{RoundId, RoundLifecycle, SettleCause, Settlement, TimerFired};
pub use queue::{QueuePosition, TurnQueue};
pub use requester::Requester;
pub use scheduler::{Event, RoundSnapshot, Scheduler};
