//! The connection registry: tracks every live session and its role.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is a plain struct with no interior locking. It is
//! owned by the scheduler actor and only ever touched from its dispatch
//! loop.

use std::collections::HashMap;

use turnstile_protocol::{RoleClaim, ServerMessage, SessionId};

use crate::{RegistryError, Role, Session, SessionOutbound, SessionSender};

/// All live sessions, keyed by id, plus the resource-owner binding.
///
/// ```text
/// connect() ──→ [Unclassified] ──register()──→ [ResourceOwner | Requester]
///                     │                                   │
///                     └────────────unregister()───────────┘
/// ```
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<SessionId, Session>,

    /// The session bound as resource owner. Kept in sync with the `role`
    /// of that session's entry.
    resource_owner: Option<SessionId>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly connected, unclassified session.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyConnected`] if the id is already present.
    pub fn connect(&mut self, id: SessionId, outbox: SessionSender) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&id) {
            return Err(RegistryError::AlreadyConnected(id));
        }
        self.sessions.insert(id, Session::new(id, outbox));
        tracing::debug!(session = %id, "session connected");
        Ok(())
    }

    /// Binds a role to a connected session.
    ///
    /// Claiming the role the session already holds is a no-op.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownSession`]: the session is not connected
    /// - [`RegistryError::RoleConflict`]: another session owns the resource
    /// - [`RegistryError::AlreadyClassified`]: the session holds the other role
    pub fn register(&mut self, id: SessionId, claim: RoleClaim) -> Result<(), RegistryError> {
        let wanted = Role::from(claim);
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSession(id))?;

        if session.role == wanted {
            return Ok(());
        }
        if session.role != Role::Unclassified {
            return Err(RegistryError::AlreadyClassified(id, session.role));
        }
        if wanted.is_resource() {
            if let Some(existing) = self.resource_owner {
                return Err(RegistryError::RoleConflict { existing });
            }
            self.resource_owner = Some(id);
        }

        session.role = wanted;
        tracing::info!(session = %id, role = %wanted, "session registered");
        Ok(())
    }

    /// Removes a session and returns the role it held.
    ///
    /// Returns `None` if the session was not connected.
    pub fn unregister(&mut self, id: SessionId) -> Option<Role> {
        let session = self.sessions.remove(&id)?;
        if self.resource_owner == Some(id) {
            self.resource_owner = None;
        }
        tracing::debug!(session = %id, role = %session.role, "session unregistered");
        Some(session.role)
    }

    /// The role of a connected session.
    pub fn role(&self, id: SessionId) -> Option<Role> {
        self.sessions.get(&id).map(|s| s.role)
    }

    /// The session currently bound as resource owner.
    pub fn resource_owner(&self) -> Option<SessionId> {
        self.resource_owner
    }

    /// Whether `id` is the bound resource owner.
    pub fn is_resource_owner(&self, id: SessionId) -> bool {
        self.resource_owner == Some(id)
    }

    /// Sends a message to one session.
    ///
    /// Returns `false` if the session is unknown or its writer has gone
    /// away. Either way the caller carries on: a dead recipient is cleaned
    /// up by its own disconnect event.
    pub fn send(&self, id: SessionId, msg: ServerMessage) -> bool {
        match self.sessions.get(&id) {
            Some(session) => session.deliver(SessionOutbound::Message(msg)),
            None => false,
        }
    }

    /// Sends a message to the resource owner, if one is bound.
    pub fn send_to_resource(&self, msg: ServerMessage) -> bool {
        match self.resource_owner {
            Some(id) => self.send(id, msg),
            None => false,
        }
    }

    /// Sends a message to every session that is not the resource owner.
    ///
    /// Returns how many sessions it was queued for.
    pub fn broadcast(&self, msg: ServerMessage) -> usize {
        self.sessions
            .values()
            .filter(|s| !s.role.is_resource())
            .filter(|s| s.deliver(SessionOutbound::Message(msg.clone())))
            .count()
    }

    /// Tells a session's writer to close the transport.
    pub fn close(&self, id: SessionId, reason: impl Into<String>) {
        if let Some(session) = self.sessions.get(&id) {
            let _ = session.deliver(SessionOutbound::Close {
                reason: reason.into(),
            });
        }
    }

    /// Number of connected sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
