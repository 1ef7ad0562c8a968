//! Connection registry for Turnstile.
//!
//! Every live transport session is tracked here, together with the role it
//! has claimed and the channel its outbound messages travel on.
//!
//! 1. **Classification**: each session is exactly one of
//!    [`Role::Unclassified`], [`Role::ResourceOwner`], [`Role::Requester`].
//! 2. **Exclusivity**: at most one session is the resource owner. A second
//!    claim is rejected with [`RegistryError::RoleConflict`], never queued.
//! 3. **Delivery**: messages to one session, to the resource, or to every
//!    non-resource session, all fire-and-forget.
//!
//! # How it fits in the stack
//!
//! ```text
//! Scheduler (above)  ← decides who is told what
//!     ↕
//! Registry (this crate)  ← knows who is connected, in which role
//!     ↕
//! Protocol (below)  ← SessionId, ServerMessage
//! ```

mod error;
mod registry;
mod session;

pub use error::RegistryError;
pub use registry::ConnectionRegistry;
pub use session::{Role, Session, SessionOutbound, SessionSender};
