//! HTTP/WS frontend: the `/ws` upgrade endpoint, `/health`, and the
//! read-only `/admin/games/{id}/stats` endpoint.
//!
//! The upgrade handler splits each socket into a command-routing reader
//! loop and an outbound-queue-draining writer task, sending `Welcome`
//! immediately and waiting for `Auth` before admitting the session to a
//! table (`Authenticated`/`Joined` follow once admission succeeds).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::director::Director;
use crate::protocol::{ClientCommand, ErrorCode, ServerEvent};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Builds the full router for the `server` binary; the admin/health
/// routes need no upgrade and can be probed without ever speaking the
/// wire protocol.
pub fn router(director: Arc<Director>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/admin/games/:id/stats", get(admin_stats))
        .with_state(director)
}

async fn health() -> &'static str {
    "ok"
}

async fn admin_stats(State(director): State<Arc<Director>>, Path(id): Path<String>) -> impl IntoResponse {
    match director.stats(&id) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => (axum::http::StatusCode::NOT_FOUND, err.to_string()).into_response(),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(director): State<Arc<Director>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, director))
}

/// One connection's full lifecycle: `Welcome`, block for `Auth`, admit via
/// the Director, then split into a reader loop (decodes frames, routes
/// commands to the table) and a writer task (drains the session's
/// outbound queue).
async fn handle_socket(socket: WebSocket, director: Arc<Director>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let session_id = format!("s{}", NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));

    if send_event(&mut ws_tx, &ServerEvent::welcome(session_id.clone())).await.is_err() {
        return;
    }

    let (game_id, seat, stack, outbound, outbound_tx) = match authenticate(&mut ws_rx, &mut ws_tx, &director).await {
        Some(joined) => joined,
        None => return,
    };

    info!(%game_id, seat, %session_id, "session authenticated and seated");
    if send_event(
        &mut ws_tx,
        &ServerEvent::Authenticated { player_id: format!("{game_id}-{seat}"), display_name: session_id.clone() },
    )
    .await
    .is_err()
    {
        return;
    }
    if send_event(&mut ws_tx, &ServerEvent::Joined { table_id: game_id.clone(), seat, stack }).await.is_err() {
        return;
    }

    let mut outbound = outbound;
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            if send_event(&mut ws_tx, &event).await.is_err() {
                break;
            }
        }
    });

    // The first three malformed messages are tolerated, the fourth
    // closes the connection.
    let mut violations = 0u32;
    loop {
        let Some(frame) = ws_rx.next().await else { break };
        let msg = match frame {
            Ok(msg) => msg,
            Err(_) => break,
        };
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<ClientCommand>(&text) {
            Ok(ClientCommand::Auth { .. }) => {}
            Ok(command) => director.route_command(&game_id, seat, command),
            Err(err) => {
                violations += 1;
                warn!(%err, seat, violations, "malformed client message");
                let _ = outbound_tx.try_send(ServerEvent::Error { code: ErrorCode::Protocol, message: err.to_string() });
                if violations >= 4 {
                    break;
                }
            }
        }
    }

    director.route_command(&game_id, seat, ClientCommand::Leave {});
    writer.abort();
}

/// Waits for a well-formed `Auth` command, admitting through the Director
/// and replying `Error(auth)` on admission failure without dropping the
/// connection — auth failures don't close the socket by themselves.
async fn authenticate(
    ws_rx: &mut futures::stream::SplitStream<WebSocket>,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    director: &Director,
) -> Option<(String, usize, u64, tokio::sync::mpsc::Receiver<ServerEvent>, tokio::sync::mpsc::Sender<ServerEvent>)> {
    loop {
        let frame = ws_rx.next().await?;
        let msg = frame.ok()?;
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                return None;
            }
            continue;
        };
        match serde_json::from_str::<ClientCommand>(&text) {
            Ok(ClientCommand::Auth { name, game_id, buy_in }) => {
                let (mut reply_rx, mut outbound_rx, outbound_tx) = match director.begin_join(&game_id, name, buy_in) {
                    Ok(pending) => pending,
                    Err(err) => {
                        send_event(ws_tx, &ServerEvent::Error { code: ErrorCode::Auth, message: err.to_string() })
                            .await
                            .ok()?;
                        continue;
                    }
                };
                // The table may not admit this seat right away (it's
                // mid-hand); relay whatever it sends in the meantime
                // (a `queued` notice) instead of leaving the client
                // waiting on silence until `Joined` finally arrives.
                let ack = loop {
                    tokio::select! {
                        ack = &mut reply_rx => break ack,
                        Some(event) = outbound_rx.recv() => {
                            send_event(ws_tx, &event).await.ok()?;
                        }
                    }
                };
                match ack {
                    Ok(Ok(joined)) => return Some((joined.table_id, joined.seat, joined.stack, outbound_rx, outbound_tx)),
                    Ok(Err(err)) => {
                        send_event(ws_tx, &ServerEvent::Error { code: ErrorCode::Auth, message: err.to_string() })
                            .await
                            .ok()?;
                    }
                    Err(_) => {
                        send_event(
                            ws_tx,
                            &ServerEvent::Error { code: ErrorCode::Auth, message: "table shut down before admitting this seat".to_string() },
                        )
                        .await
                        .ok()?;
                    }
                }
            }
            Ok(_) => {
                send_event(
                    ws_tx,
                    &ServerEvent::Error { code: ErrorCode::Protocol, message: "expected auth first".to_string() },
                )
                .await
                .ok()?;
            }
            Err(err) => {
                send_event(ws_tx, &ServerEvent::Error { code: ErrorCode::Protocol, message: err.to_string() })
                    .await
                    .ok()?;
            }
        }
    }
}

async fn send_event(ws_tx: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).expect("ServerEvent always serializes");
    ws_tx.send(Message::Text(text.into())).await
}
