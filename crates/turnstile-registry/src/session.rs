//! Session types: one record per live transport connection.

use std::fmt;

use tokio::sync::mpsc;
use turnstile_protocol::{RoleClaim, ServerMessage, SessionId};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// What a session is to the scheduler.
///
/// ```text
///                 ┌──(register resource)──→ ResourceOwner
///   Unclassified ─┤
///                 └──(register requester | join)──→ Requester
/// ```
///
/// A session leaves `Unclassified` at most once; there is no transition
/// between the two classified roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Connected, but has not said who it is.
    Unclassified,
    /// The single live game instance.
    ResourceOwner,
    /// A player controller.
    Requester,
}

impl Role {
    /// Returns `true` for the resource owner.
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::ResourceOwner)
    }
}

impl From<RoleClaim> for Role {
    fn from(claim: RoleClaim) -> Self {
        match claim {
            RoleClaim::Resource => Self::ResourceOwner,
            RoleClaim::Requester => Self::Requester,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => write!(f, "Unclassified"),
            Self::ResourceOwner => write!(f, "ResourceOwner"),
            Self::Requester => write!(f, "Requester"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound channel
// ---------------------------------------------------------------------------

/// An item on a session's outbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutbound {
    /// Encode and send this message.
    Message(ServerMessage),
    /// Close the transport. Nothing queued after this is delivered.
    Close { reason: String },
}

/// Channel sender for delivering outbound items to a session's writer.
///
/// Unbounded so that the scheduler never waits on a slow socket.
pub type SessionSender = mpsc::UnboundedSender<SessionOutbound>;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The registry's record of one connection.
#[derive(Debug)]
pub struct Session {
    /// Which connection this is.
    pub id: SessionId,

    /// Current classification.
    pub role: Role,

    outbox: SessionSender,
}

impl Session {
    pub(crate) fn new(id: SessionId, outbox: SessionSender) -> Self {
        Self {
            id,
            role: Role::Unclassified,
            outbox,
        }
    }

    /// Queues an outbound item. Returns `false` if the writer is gone.
    pub(crate) fn deliver(&self, item: SessionOutbound) -> bool {
        self.outbox.send(item).is_ok()
    }
}
