//! # Turnstile
//!
//! Turn-rotation server for one shared game.
//!
//! A single game page registers as the *resource*; any number of
//! controller pages register as *requesters* and join a FIFO queue. The
//! server hands the game to one requester at a time: a preparation
//! window, a timed round with live controls, then a score settlement
//! before the next in line takes over.
//!
//! ```text
//! WebSocket ─→ handler ─→ SchedulerHandle ─→ scheduler actor
//!     ↑                                          │
//!     └────── writer task ←── session outbox ←───┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turnstile::prelude::*;
//!
//! # async fn run() -> Result<(), TurnstileError> {
//! let server = TurnstileServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .round_config(RoundConfig::default())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::TurnstileError;
pub use server::{TurnstileServer, TurnstileServerBuilder};

pub mod prelude {
    pub use crate::{TurnstileError, TurnstileServer, TurnstileServerBuilder};
    pub use turnstile_protocol::{ClientMessage, RoleClaim, ServerMessage, SessionId};
    pub use turnstile_round::{Phase, RoundConfig, RoundSnapshot, SchedulerHandle};
}
