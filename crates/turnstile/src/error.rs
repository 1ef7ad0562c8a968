//! Unified error type for the Turnstile server.

use turnstile_round::SchedulerError;
use turnstile_transport::TransportError;

/// Top-level error wrapping every crate-specific error the server layer
/// can surface.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically. Codec and registry
/// failures never reach this far: the handler skips undecodable frames
/// and the scheduler absorbs registry errors.
#[derive(Debug, thiserror::Error)]
pub enum TurnstileError {
    /// Binding, accepting, sending, or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The scheduler has stopped.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
