//! Per-connection handler.
//!
//! Each accepted peer gets its own task running [`handle_connection`]:
//!   1. Complete the WebSocket handshake
//!   2. Register the session with the scheduler, handing it an outbox
//!   3. Spawn a writer that drains the outbox into the socket
//!   4. Loop: receive frames → decode → forward to the scheduler
//!   5. On exit, a drop guard reports the disconnect

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::error::Elapsed;
use turnstile_protocol::{ClientMessage, Codec, SessionId};
use turnstile_registry::SessionOutbound;
use turnstile_round::{Event, SchedulerHandle};
use turnstile_transport::{
    Connection, Incoming, IncomingWebSocket, TransportError, WebSocketConnection,
};

use crate::TurnstileError;
use crate::server::ServerState;

/// Drop guard that tells the scheduler a session is gone.
///
/// Runs however the handler exits, including by panic. `Drop` is
/// synchronous, so the send happens on a spawned task.
struct DisconnectGuard {
    session: SessionId,
    scheduler: SchedulerHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let session = self.session;
        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            let _ = scheduler.send(Event::Disconnect { session }).await;
        });
    }
}

/// Handles a single connection from handshake to close.
pub(crate) async fn handle_connection<C: Codec>(
    incoming: IncomingWebSocket,
    state: Arc<ServerState<C>>,
) -> Result<(), TurnstileError> {
    let peer = incoming.peer_addr();
    let conn = match incoming.establish().await {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            tracing::debug!(%peer, error = %e, "handshake failed");
            return Err(e.into());
        }
    };
    let session = SessionId::from(conn.id());
    tracing::debug!(%session, peer = %conn.peer_addr(), "handling new connection");

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    state
        .scheduler
        .send(Event::Connect {
            session,
            outbox: outbox_tx,
        })
        .await?;
    let _guard = DisconnectGuard {
        session,
        scheduler: state.scheduler.clone(),
    };

    let (done_tx, mut writer_done) = oneshot::channel();
    let writer = tokio::spawn(write_outbound(
        Arc::clone(&conn),
        state.codec.clone(),
        outbox_rx,
        done_tx,
        session,
    ));

    let result = read_inbound(&conn, &state, session, &mut writer_done).await;

    writer.abort();
    // _guard drops here → Event::Disconnect fires.
    result
}

/// Decodes inbound frames and forwards them to the scheduler until the
/// peer goes away or the writer stops.
///
/// Malformed frames are skipped; the connection stays open.
async fn read_inbound<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    session: SessionId,
    writer_done: &mut oneshot::Receiver<()>,
) -> Result<(), TurnstileError> {
    loop {
        let received = tokio::select! {
            received = next_frame(conn, state.idle_timeout) => received,
            _ = &mut *writer_done => {
                tracing::debug!(%session, "writer finished, stopping reader");
                return Ok(());
            }
        };

        let data = match received {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%session, "connection closed cleanly");
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::debug!(%session, error = %e, "recv error");
                return Ok(());
            }
            Err(_) => {
                tracing::info!(%session, "connection idle, closing");
                return Ok(());
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%session, error = %e, "ignoring malformed frame");
                continue;
            }
        };
        state.scheduler.send(Event::from_client(session, msg)).await?;
    }
}

/// Receives one frame, giving up after `idle` if set.
async fn next_frame(
    conn: &WebSocketConnection,
    idle: Option<Duration>,
) -> Result<Result<Option<Vec<u8>>, TransportError>, Elapsed> {
    match idle {
        Some(limit) => tokio::time::timeout(limit, conn.recv()).await,
        None => Ok(conn.recv().await),
    }
}

/// Drains a session's outbox into its socket until the outbox closes, a
/// send fails, or the scheduler asks for the connection to be closed.
async fn write_outbound<C: Codec>(
    conn: Arc<WebSocketConnection>,
    codec: C,
    mut outbox: mpsc::UnboundedReceiver<SessionOutbound>,
    done: oneshot::Sender<()>,
    session: SessionId,
) {
    while let Some(item) = outbox.recv().await {
        match item {
            SessionOutbound::Message(msg) => {
                let bytes = match codec.encode(&msg) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(%session, error = %e, "failed to encode message");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(%session, error = %e, "send failed");
                    break;
                }
            }
            SessionOutbound::Close { reason } => {
                tracing::info!(%session, %reason, "closing connection");
                if let Err(e) = conn.close().await {
                    tracing::debug!(%session, error = %e, "close failed");
                }
                break;
            }
        }
    }
    let _ = done.send(());
}
