//! Hand monitor observer trait.
//!
//! A synchronous, non-blocking hook fired at the key points of a game's
//! lifecycle. Every method has a default no-op body so implementors only
//! override what they care about — the server layer composes multiple
//! monitors (hand history, stats) behind a `Vec<Box<dyn HandMonitor>>`.

use crate::card::Card;
use crate::hand::{ActionRecord, HandOutcome, Street};

/// Observes a single table's games as they happen. Calls are made inline
/// with the hand state machine's own progress, so implementations must
/// not block — if a monitor needs to do I/O, it should queue the event
/// and hand it to a background task.
pub trait HandMonitor: Send {
    fn on_game_start(&mut self, _table_id: &str, _num_seats: usize) {}

    fn on_hand_start(&mut self, _hand_id: u64, _button_seat: usize, _seats: &[usize]) {}

    fn on_player_action(&mut self, _hand_id: u64, _record: &ActionRecord) {}

    fn on_street_change(&mut self, _hand_id: u64, _street: Street, _board: &[Card]) {}

    fn on_hand_complete(&mut self, _outcome: &HandOutcome) {}

    fn on_game_complete(&mut self, _table_id: &str, _hands_played: u64) {}
}

/// A monitor that observes nothing. Used as the default when no hand
/// history or stats collection is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMonitor;

impl HandMonitor for NullMonitor {}
