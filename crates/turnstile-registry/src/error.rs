//! Error types for the registry.

use turnstile_protocol::SessionId;

use crate::Role;

/// Errors that can occur while binding sessions and roles.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Another session already owns the resource. The claimant is expected
    /// to be disconnected by the caller.
    #[error("resource already owned by {existing}")]
    RoleConflict { existing: SessionId },

    /// No session with this id is connected.
    #[error("session {0} is not connected")]
    UnknownSession(SessionId),

    /// A session with this id is already connected.
    #[error("session {0} is already connected")]
    AlreadyConnected(SessionId),

    /// The session already holds a different role. Roles are bound once.
    #[error("session {0} is already registered as {1}")]
    AlreadyClassified(SessionId, Role),
}
