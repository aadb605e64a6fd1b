//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{SessionCommand, SessionHandle};
use crate::http::AppError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler for `/sessions/:id/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let handle = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))?;

    info!(session_id = %session_id, "WebSocket upgrade");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, handle)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, handle: SessionHandle) {
    let conn_id = Uuid::new_v4();
    info!(session_id = %handle.id, conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        conn_id,
        session_id: handle.id,
        variant: handle.variant,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send welcome");
        return;
    }

    // Subscribe before attaching so no snapshot is missed
    let snapshot_rx = handle.subscribe();
    let (reply_tx, reply_rx) = mpsc::channel(32);

    if handle
        .command_tx
        .send(SessionCommand::Connect { conn_id, reply_tx })
        .await
        .is_err()
    {
        let _ = send_msg(
            &mut ws_sink,
            &ServerMsg::SessionClosed {
                reason: "session ended".to_string(),
            },
        )
        .await;
        return;
    }

    run_connection(conn_id, &handle, ws_sink, ws_stream, snapshot_rx, reply_rx).await;

    let _ = handle
        .command_tx
        .send(SessionCommand::Disconnect { conn_id })
        .await;

    info!(session_id = %handle.id, conn_id = %conn_id, "WebSocket connection closed");
}

/// Pump messages both ways until either side finishes
async fn run_connection(
    conn_id: Uuid,
    handle: &SessionHandle,
    ws_sink: SplitSink<WebSocket, Message>,
    ws_stream: SplitStream<WebSocket>,
    snapshot_rx: broadcast::Receiver<ServerMsg>,
    reply_rx: mpsc::Receiver<ServerMsg>,
) {
    let mut writer_handle = tokio::spawn(write_loop(conn_id, ws_sink, snapshot_rx, reply_rx));
    let reader = read_loop(conn_id, ws_stream, handle.command_tx.clone());

    tokio::select! {
        _ = &mut writer_handle => {
            debug!(conn_id = %conn_id, "Writer finished");
        }
        _ = reader => {
            writer_handle.abort();
        }
    }
}

/// Session broadcasts and direct replies -> WebSocket
async fn write_loop(
    conn_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
    mut reply_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            reply = reply_rx.recv() => match reply {
                Some(msg) => msg,
                None => break,
            },
            received = snapshot_rx.recv() => match received {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} snapshots", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Snapshot channel closed");
                    break;
                }
            },
        };

        let terminal = matches!(msg, ServerMsg::MatchOver { .. } | ServerMsg::SessionClosed { .. });

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }

        if terminal {
            let _ = ws_sink.send(Message::Close(None)).await;
            break;
        }
    }
}

/// WebSocket -> session loop
async fn read_loop(
    conn_id: Uuid,
    mut ws_stream: SplitStream<WebSocket>,
    command_tx: mpsc::Sender<SessionCommand>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        if !admit(&rate_limiter, &msg) {
                            warn!(conn_id = %conn_id, "Rate limited input");
                            continue;
                        }

                        let command = SessionCommand::Client {
                            conn_id,
                            msg,
                            received_at: unix_millis(),
                        };
                        if command_tx.send(command).await.is_err() {
                            debug!(conn_id = %conn_id, "Command channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Only input is throttled; join, leave and ping always reach the session
fn admit(rate_limiter: &ConnectionRateLimiter, msg: &ClientMsg) -> bool {
    match msg {
        ClientMsg::Input { .. } => rate_limiter.check_input(),
        _ => true,
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::Buttons;

    #[test]
    fn control_messages_bypass_input_limit() {
        let limiter = ConnectionRateLimiter::new();
        let input = ClientMsg::Input {
            seq: 1,
            buttons: Buttons::default(),
        };

        let admitted = (0..200).filter(|_| admit(&limiter, &input)).count();
        assert!(admitted < 200);

        assert!(admit(&limiter, &ClientMsg::Leave));
        assert!(admit(&limiter, &ClientMsg::Join));
        assert!(admit(&limiter, &ClientMsg::Ping { t: 7 }));
    }
}
