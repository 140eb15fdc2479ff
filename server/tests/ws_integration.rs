//! End-to-end protocol tests: two real WebSocket clients
//! against a real `axum` listener, speaking the actual wire protocol
//! instead of poking at `Table`/`Hand` directly. Exercises the
//! handshake (`Welcome` → `Auth` → `Authenticated`/`Joined`), a full
//! heads-up hand driven to showdown, and the timeout-substitution path.

use std::time::Duration;

use engine::TableConfig;
use futures::{SinkExt, StreamExt};
use poker_ws::director::{Director, DirectorConfig};
use poker_ws::http;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server(config: DirectorConfig) -> (String, std::sync::Arc<Director>) {
    let director = std::sync::Arc::new(Director::new(config));
    let app = http::router(director.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("ws://{addr}/ws"), director)
}

fn default_config(decision_timeout_ms: u64) -> DirectorConfig {
    DirectorConfig {
        table: TableConfig {
            max_seats: 6,
            small_blind: 5,
            big_blind: 10,
            ante: 0,
            start_chips: 1000,
            min_players: 2,
            infinite_bankroll: false,
        },
        seed: 42,
        decision_timeout: Duration::from_millis(decision_timeout_ms),
        hand_limit: None,
        enable_stats: true,
        hand_history_path: None,
    }
}

async fn connect_and_join(url: &str, name: &str, game_id: &str, buy_in: u64) -> Client {
    let (mut ws, _) = connect_async(url).await.expect("connect");
    recv_json(&mut ws).await; // Welcome
    send_json(&mut ws, &json!({"type": "auth", "name": name, "game_id": game_id, "buy_in": buy_in})).await;
    recv_json(&mut ws).await; // Authenticated
    recv_json(&mut ws).await; // Joined
    ws
}

async fn send_json(ws: &mut Client, value: &Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn recv_json(ws: &mut Client) -> Value {
    loop {
        match ws.next().await.expect("stream ended").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

/// Reads events until one of `type` matching `wanted` arrives, answering
/// every `action_request` along the way with the unified `call` token
/// (check when nothing is owed), exactly like the reference bot.
async fn drive_until(ws: &mut Client, wanted: &str) -> Value {
    loop {
        let event = recv_json(ws).await;
        if event["type"] == wanted {
            return event;
        }
        if event["type"] == "action_request" {
            let request_id = event["request_id"].clone();
            let to_call = event["to_call"].as_u64().unwrap_or(0);
            let amount = if to_call > 0 { json!(to_call) } else { Value::Null };
            send_json(ws, &json!({"type": "action_response", "request_id": request_id, "action": "call", "amount": amount})).await;
        }
    }
}

#[tokio::test]
async fn heads_up_check_down_reaches_a_hand_result() {
    let (url, _director) = start_server(default_config(200)).await;

    let mut p1 = connect_and_join(&url, "p1", "main", 1000).await;
    let mut p2 = connect_and_join(&url, "p2", "main", 1000).await;

    let start = drive_until(&mut p1, "hand_start").await;
    assert_eq!(start["your_seat"], 0);
    assert!(start["your_hole_cards"].as_array().unwrap().len() == 2);

    let result = drive_until(&mut p1, "hand_result").await;
    assert!(result["total_pot"].as_u64().unwrap() > 0);

    // p2 must see the same hand play out without ever receiving p1's hole
    // cards before the result.
    let p2_start = drive_until(&mut p2, "hand_start").await;
    assert_eq!(p2_start["your_seat"], 1);
}

#[tokio::test]
async fn unresponsive_seat_gets_a_timed_out_default_action() {
    let (url, _director) = start_server(default_config(60)).await;

    let mut p1 = connect_and_join(&url, "p1", "timeout_game", 1000).await;
    let _p2 = connect_and_join(&url, "p2", "timeout_game", 1000).await;

    // p1 never answers its action_request; the table must force-fold the
    // seat within the decision timeout rather than waiting on it forever.
    loop {
        let event = recv_json(&mut p1).await;
        if event["type"] == "player_action" && event["timeout"] == true {
            assert_eq!(event["action"].as_str(), Some("fold"));
            break;
        }
        if event["type"] == "hand_result" {
            panic!("hand completed without ever observing a timeout-tagged action");
        }
    }
}

#[tokio::test]
async fn unknown_message_type_is_reported_as_a_protocol_error_without_closing() {
    let (url, _director) = start_server(default_config(100)).await;
    let mut ws = connect_and_join(&url, "p1", "err_game", 1000).await;

    send_json(&mut ws, &json!({"type": "frobnicate"})).await;
    let event = recv_json(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["code"], "protocol");
}

#[tokio::test]
async fn mid_hand_join_is_told_it_is_queued() {
    let (url, _director) = start_server(default_config(500)).await;

    let mut p1 = connect_and_join(&url, "p1", "queued_game", 1000).await;
    let _p2 = connect_and_join(&url, "p2", "queued_game", 1000).await;
    drive_until(&mut p1, "hand_start").await;

    // A third seat joins while the hand is already in progress; the
    // table can't admit it until the hand ends, but it must say so
    // immediately rather than leaving the client hanging on `Joined`.
    let (mut p3, _) = connect_async(url.as_str()).await.expect("connect");
    recv_json(&mut p3).await; // Welcome
    send_json(&mut p3, &json!({"type": "auth", "name": "p3", "game_id": "queued_game", "buy_in": 1000})).await;
    // The table can't admit a new seat until the in-flight hand ends, so
    // it must say so before `Authenticated`/`Joined` ever arrive.
    let queued = recv_json(&mut p3).await;
    assert_eq!(queued["type"], "error");
    assert_eq!(queued["code"], "queued");

    drive_until(&mut p1, "hand_result").await;
    recv_json(&mut p3).await; // Authenticated
    let joined = recv_json(&mut p3).await;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["seat"], 2);
}

#[tokio::test]
async fn admin_stats_endpoint_reports_hands_completed() {
    let (url, director) = start_server(default_config(50)).await;
    let mut p1 = connect_and_join(&url, "p1", "stats_game", 1000).await;
    let _p2 = connect_and_join(&url, "p2", "stats_game", 1000).await;

    drive_until(&mut p1, "hand_result").await;
    // Give the table loop a moment to record the completed hand.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = director.stats("stats_game").unwrap();
    assert!(snapshot.hands_completed >= 1);
    let total: i64 = snapshot.sum_net_chips_by_player.values().sum();
    assert_eq!(total, 0, "net chips across players must sum to zero");
}
