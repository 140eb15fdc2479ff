//! Reference conformance bot: an always-call strategy, just enough to
//! exercise the protocol end to end. Speaks the wire protocol in
//! `poker_ws::protocol` directly rather than linking against the
//! `poker-ws` crate, so it stays a standalone process the Spawner can
//! launch: `SERVER_URL`/`SEED`/`BOT_ID` come in through the environment,
//! and it never folds when it doesn't have to — it calls or checks every
//! `ActionRequest` it receives and folds only when a call isn't a legal
//! option.
//!
//! This is deliberately the dumbest strategy that can finish a hand —
//! an always-call bot is all a conformance fixture needs to be.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum WireActionKind {
    Fold,
    Call,
    Bet,
    Raise,
    AllIn,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    Auth {
        name: String,
        game_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        buy_in: Option<u64>,
    },
    ActionResponse {
        request_id: u64,
        action: WireActionKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        amount: Option<u64>,
    },
    Leave {},
}

/// Only the fields this bot actually reads; every other field on a
/// `ServerEvent` variant is ignored by serde's default untagged-field
/// tolerance.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerEvent {
    Welcome {},
    Authenticated {},
    Joined {},
    HandStart {},
    StreetChange {},
    PlayerAction {},
    ActionRequest {
        request_id: u64,
        to_call: u64,
        valid_actions: Vec<WireActionKind>,
    },
    HandResult {},
    GameCompleted {},
    Error { code: String, message: String },
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let server_url = env_or("SERVER_URL", "ws://127.0.0.1:8080/ws");
    let bot_id = env_or("BOT_ID", &format!("always-call-{}", std::process::id()));
    let game_id = env_or("GAME_ID", "main");
    let buy_in: u64 = env_or("BUY_IN", "1000").parse().unwrap_or(1000);

    let (mut ws, _response) = match connect_async(server_url.as_str()).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(%err, %server_url, "failed to connect to server");
            std::process::exit(1);
        }
    };

    let auth = ClientCommand::Auth { name: bot_id.clone(), game_id, buy_in: Some(buy_in) };
    if send(&mut ws, &auth).await.is_err() {
        std::process::exit(1);
    }

    loop {
        let Some(frame) = ws.next().await else { break };
        let msg = match frame {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(%err, "connection error, exiting");
                break;
            }
        };
        let Message::Text(text) = msg else { continue };

        let event: ServerEvent = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(%err, %text, "could not parse server event, ignoring");
                continue;
            }
        };

        match event {
            ServerEvent::ActionRequest { request_id, to_call, valid_actions } => {
                let response = always_call(request_id, to_call, &valid_actions);
                if send(&mut ws, &response).await.is_err() {
                    break;
                }
            }
            ServerEvent::GameCompleted {} => break,
            ServerEvent::Error { code, message } => {
                tracing::warn!(%code, %message, "server reported an error");
            }
            _ => {}
        }
    }

    // Give the writer a moment to flush the final frames before the
    // process exits; the Spawner also tears this process down directly.
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Picks `call` (or `check`, via the same unified token, when nothing is
/// owed) whenever it is legal, and only folds when it is not.
fn always_call(request_id: u64, to_call: u64, valid_actions: &[WireActionKind]) -> ClientCommand {
    if valid_actions.contains(&WireActionKind::Call) {
        ClientCommand::ActionResponse {
            request_id,
            action: WireActionKind::Call,
            amount: if to_call > 0 { Some(to_call) } else { None },
        }
    } else {
        ClientCommand::ActionResponse { request_id, action: WireActionKind::Fold, amount: None }
    }
}

async fn send(
    ws: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    command: &ClientCommand,
) -> Result<(), ()> {
    let text = serde_json::to_string(command).map_err(|_| ())?;
    ws.send(Message::Text(text.into())).await.map_err(|_| ())
}
