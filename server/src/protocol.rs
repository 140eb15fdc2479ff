//! Wire protocol: typed envelopes for every event the server emits and
//! every command a client sends. Tagged JSON enums covering the NLHE
//! session model end to end.
//!
//! Every message carries a protocol version `v` so a future breaking
//! change can be introduced without guessing at a client's capabilities;
//! this implementation always emits `PROTOCOL_VERSION` and does not yet
//! special-case any other value on read (unknown fields are ignored by
//! `serde` by default, which gives us forward compatibility for free).

use engine::Card;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// The unified action token: `call` with `to_call == 0` means check,
/// folding the two deal table down to one name at the wire boundary.
/// `bet`/`raise`/`all_in`/`fold` are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireActionKind {
    Fold,
    Call,
    Bet,
    Raise,
    AllIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Protocol,
    Auth,
    Queued,
    IllegalAction,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatSummary {
    pub seat: usize,
    pub name: String,
    pub chips: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerSummary {
    pub name: String,
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<(Card, Card)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowdownEntry {
    pub seat: usize,
    pub hole_cards: (Card, Card),
}

/// Commands a client sends to the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Auth {
        name: String,
        game_id: String,
        #[serde(default)]
        buy_in: Option<u64>,
    },
    ActionResponse {
        request_id: u64,
        action: WireActionKind,
        #[serde(default)]
        amount: Option<u64>,
    },
    Leave {},
}

/// Events the server sends to a client. One enum serves every session;
/// the table loop is the only writer of the variants that carry hand
/// state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Welcome {
        v: u32,
        server_version: String,
        session_id: String,
    },
    Authenticated {
        player_id: String,
        display_name: String,
    },
    Joined {
        table_id: String,
        seat: usize,
        stack: u64,
    },
    HandStart {
        hand_id: u64,
        your_seat: usize,
        button: usize,
        small_blind: u64,
        big_blind: u64,
        players: Vec<SeatSummary>,
        your_hole_cards: (Card, Card),
    },
    StreetChange {
        hand_id: u64,
        street: String,
        board: Vec<Card>,
    },
    PlayerAction {
        hand_id: u64,
        seat: usize,
        action: WireActionKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        amount: Option<u64>,
        remaining_stack: u64,
        #[serde(skip_serializing_if = "is_false")]
        timeout: bool,
    },
    ActionRequest {
        hand_id: u64,
        request_id: u64,
        to_call: u64,
        min_bet: u64,
        min_raise: u64,
        pot: u64,
        valid_actions: Vec<WireActionKind>,
    },
    HandResult {
        hand_id: u64,
        winners: Vec<WinnerSummary>,
        showdown: Vec<ShowdownEntry>,
        total_pot: u64,
    },
    GameCompleted {
        hands_completed: u64,
        reason: String,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The wire name for a `StreetChange` event's `street` field.
pub fn street_wire_name(street: engine::Street) -> &'static str {
    match street {
        engine::Street::Preflop => "preflop",
        engine::Street::Flop => "flop",
        engine::Street::Turn => "turn",
        engine::Street::River => "river",
        engine::Street::Showdown => "showdown",
        engine::Street::Complete => "complete",
    }
}

impl ServerEvent {
    /// A `Welcome` stamped with the current protocol version; every other
    /// event is constructed directly by its producer (the table loop, the
    /// director, or the session handshake).
    pub fn welcome(session_id: impl Into<String>) -> Self {
        ServerEvent::Welcome {
            v: PROTOCOL_VERSION,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            session_id: session_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_command_auth_round_trips_through_json() {
        let json = r#"{"type":"auth","name":"bot1","game_id":"main","buy_in":1000}"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        match cmd {
            ClientCommand::Auth { name, game_id, buy_in } => {
                assert_eq!(name, "bot1");
                assert_eq!(game_id, "main");
                assert_eq!(buy_in, Some(1000));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_message_type_fails_to_deserialize() {
        let json = r#"{"type":"frobnicate"}"#;
        let result: Result<ClientCommand, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn action_request_serializes_valid_actions_as_snake_case_tokens() {
        let event = ServerEvent::ActionRequest {
            hand_id: 1,
            request_id: 1,
            to_call: 0,
            min_bet: 10,
            min_raise: 20,
            pot: 15,
            valid_actions: vec![WireActionKind::Call, WireActionKind::Bet, WireActionKind::Fold],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"valid_actions\":[\"call\",\"bet\",\"fold\"]"));
    }

    #[test]
    fn hole_cards_use_canonical_two_character_notation_on_the_wire() {
        let event = ServerEvent::HandStart {
            hand_id: 1,
            your_seat: 0,
            button: 0,
            small_blind: 5,
            big_blind: 10,
            players: vec![],
            your_hole_cards: ("As".parse().unwrap(), "Td".parse().unwrap()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"your_hole_cards\":[\"As\",\"Td\"]"));
    }
}
