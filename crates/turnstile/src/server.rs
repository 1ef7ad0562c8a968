//! `TurnstileServer` builder and accept loop.
//!
//! This is the entry point for running a Turnstile server. It ties the
//! layers together: transport → protocol → scheduler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use turnstile_protocol::{Codec, JsonCodec};
use turnstile_round::{RoundConfig, SchedulerHandle, spawn_scheduler};
use turnstile_transport::{Transport, WebSocketTransport};

use crate::TurnstileError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) scheduler: SchedulerHandle,
    pub(crate) codec: C,
    /// Close a connection that sends nothing for this long.
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a Turnstile server.
///
/// # Example
///
/// ```rust,ignore
/// let server = TurnstileServer::builder()
///     .bind("0.0.0.0:8080")
///     .idle_timeout(Duration::from_secs(120))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct TurnstileServerBuilder {
    bind_addr: String,
    round_config: RoundConfig,
    idle_timeout: Option<Duration>,
}

impl TurnstileServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            round_config: RoundConfig::default(),
            idle_timeout: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the round timing.
    pub fn round_config(mut self, config: RoundConfig) -> Self {
        self.round_config = config;
        self
    }

    /// Drops connections that stay silent for `timeout`. Off by default:
    /// the game page may legitimately send nothing for a long time.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Binds the listener and starts the scheduler actor.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<TurnstileServer<JsonCodec>, TurnstileError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let scheduler = spawn_scheduler(self.round_config);

        let state = Arc::new(ServerState {
            scheduler,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(TurnstileServer { transport, state })
    }
}

impl Default for TurnstileServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Turnstile server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TurnstileServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl TurnstileServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> TurnstileServerBuilder {
        TurnstileServerBuilder::new()
    }
}

impl<C: Codec> TurnstileServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TurnstileError> {
        Ok(self.transport.local_addr()?)
    }

    /// A handle to the scheduler, for snapshots and diagnostics.
    pub fn scheduler(&self) -> SchedulerHandle {
        self.state.scheduler.clone()
    }

    /// Runs the accept loop, spawning a handler task per connection.
    ///
    /// The WebSocket handshake happens inside the spawned task, so the
    /// loop goes straight back to accepting. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), TurnstileError> {
        tracing::info!("Turnstile server running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(incoming, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
