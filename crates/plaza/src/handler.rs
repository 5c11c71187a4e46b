//! Per-connection handler: decode, dispatch, clean up.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the connection's outbox. The flow is:
//!   1. Create a `Session` in `Connecting`
//!   2. Loop: receive frames → decode → `join` / `move`
//!   3. On close, error or idle timeout → `handle_disconnect`
//!
//! Frames from one connection are handled strictly in order, so a join
//! always finishes before that connection's first move is looked at.

use std::sync::Arc;
use std::time::Duration;

use plaza_protocol::{ClientMessage, Codec, ServerMessage, SessionId};
use plaza_session::{IdentityVerifier, Session, SessionError, SpaceDirectory};
use plaza_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::PlazaError;
use crate::server::ServerState;

/// How long the writer may keep flushing after the reader has finished.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Handles a single connection from accept to close.
///
/// Returns an error only when the session ended abnormally (rejected
/// token, unknown space). Ordinary disconnects return `Ok`.
pub(crate) async fn handle_connection<V, D, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<V, D, C>>,
) -> Result<(), PlazaError>
where
    V: IdentityVerifier,
    D: SpaceDirectory,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let session_id = SessionId::next();
    tracing::debug!(%conn_id, %session_id, "handling new connection");

    let (outbox, outbound) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), outbound, Arc::clone(&state)));

    let mut session = Session::new(session_id, state.registry.clone(), outbox.clone());
    let mut outcome = Ok(());

    loop {
        let received = match state.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%session_id, "connection idle, closing");
                    break;
                }
            },
            None => conn.recv().await,
        };
        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%session_id, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "undecodable frame");
                send_error(&outbox, 400, "malformed message");
                continue;
            }
        };

        match msg {
            ClientMessage::Join { token, space_id } => {
                let joined = session
                    .handle_join(&state.verifier, &state.spaces, &token, space_id)
                    .await;
                match joined {
                    Ok(_) => {}
                    Err(SessionError::AlreadyJoined) => {
                        send_error(&outbox, 409, "already joined a space");
                    }
                    Err(e) => {
                        tracing::info!(%session_id, error = %e, "join refused, closing");
                        outcome = Err(e.into());
                        break;
                    }
                }
            }
            ClientMessage::Move(target) => {
                if let Err(e) = session.handle_move(target).await {
                    tracing::debug!(%session_id, error = %e, "move ignored");
                }
            }
        }
    }

    session.handle_disconnect().await;
    drop(session);
    drop(outbox);

    // Let queued messages reach the client before the socket closes.
    let mut writer = writer;
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    if let Err(e) = conn.close().await {
        tracing::trace!(%session_id, error = %e, "close after disconnect");
    }

    tracing::debug!(%conn_id, %session_id, "connection finished");
    outcome
}

/// Encodes and sends everything pushed into a connection's outbox, in
/// order, until every sender is gone or the socket fails.
async fn write_loop<V, D, C>(
    conn: Arc<WebSocketConnection>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    state: Arc<ServerState<V, D, C>>,
) where
    C: Codec,
{
    while let Some(msg) = outbound.recv().await {
        let bytes = match state.codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(conn_id = %conn.id(), error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, writer stopping");
            break;
        }
    }
}

/// Queues an `error` frame for this connection only.
fn send_error(outbox: &mpsc::UnboundedSender<ServerMessage>, code: u16, message: &str) {
    let _ = outbox.send(ServerMessage::Error {
        code,
        message: message.to_string(),
    });
}
