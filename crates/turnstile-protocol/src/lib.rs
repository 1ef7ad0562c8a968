//! Wire protocol for Turnstile.
//!
//! Three kinds of participants share one socket protocol:
//!
//! - the **resource** (the live game) registers once and reports scores,
//! - **requesters** (player controllers) queue up and drive the game,
//! - unclassified sessions that have connected but not said who they are.
//!
//! Every frame is one JSON object tagged by `type`, e.g.
//! `{"type":"join","displayName":"ada"}`. Inbound frames decode into
//! [`ClientMessage`], outbound ones are built from [`ServerMessage`].
//!
//! ```text
//! Transport (frames) → Protocol (ClientMessage) → Scheduler (events)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Direction, MAX_DISPLAY_NAME_LEN, MovePhase, RoleClaim, ServerMessage,
    SessionId, normalize_display_name,
};
