//! Table (synchronous half): seat ring, button rotation, the table's
//! single RNG, and the bridge into starting and resolving `Hand`s.
//!
//! This type owns the only source of randomness used anywhere in the
//! core engine and is deliberately synchronous — the server crate wraps
//! it in an actor task that owns the async I/O.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::card::Deck;
use crate::error::TableError;
use crate::hand::{Hand, HandOutcome};

#[derive(Debug, Clone)]
pub struct TableConfig {
    pub max_seats: usize,
    pub small_blind: u64,
    pub big_blind: u64,
    pub ante: u64,
    pub start_chips: u64,
    pub min_players: usize,
    /// When set, every seat's stack is topped up to `start_chips` before
    /// each hand instead of carrying forward wins and losses. Used for
    /// bot conformance runs that should never produce a busted seat.
    pub infinite_bankroll: bool,
}

#[derive(Debug, Clone)]
pub struct SeatState {
    pub stack: u64,
    /// Sitting out skips a seat when forming the next hand (used for a
    /// seat awaiting rebuy or in a disconnect grace period) without
    /// vacating it.
    pub sitting_out: bool,
}

pub struct Table {
    pub table_id: String,
    pub config: TableConfig,
    pub seats: Vec<Option<SeatState>>,
    pub button_seat: Option<usize>,
    pub hand_counter: u64,
    rng: StdRng,
}

impl Table {
    pub fn new(table_id: impl Into<String>, config: TableConfig, seed: u64) -> Self {
        let max_seats = config.max_seats;
        Table {
            table_id: table_id.into(),
            config,
            seats: vec![None; max_seats],
            button_seat: None,
            hand_counter: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seat_player(&mut self, seat: usize, stack: u64) -> Result<(), TableError> {
        if seat >= self.seats.len() {
            return Err(TableError::SeatEmpty(seat));
        }
        if self.seats[seat].is_some() {
            return Err(TableError::SeatOccupied(seat));
        }
        self.seats[seat] = Some(SeatState { stack, sitting_out: false });
        Ok(())
    }

    pub fn remove_player(&mut self, seat: usize) -> Result<SeatState, TableError> {
        self.seats
            .get_mut(seat)
            .and_then(|s| s.take())
            .ok_or(TableError::SeatEmpty(seat))
    }

    pub fn occupied_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    fn eligible_for_next_hand(&self) -> Vec<usize> {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.as_ref().filter(|s| {
                    !s.sitting_out && (self.config.infinite_bankroll || s.stack > 0)
                })
                .map(|_| i)
            })
            .collect()
    }

    fn advance_button(&mut self, eligible: &[usize]) -> usize {
        let next = match self.button_seat {
            Some(current) => eligible
                .iter()
                .copied()
                .find(|&s| s > current)
                .unwrap_or(eligible[0]),
            None => eligible[0],
        };
        self.button_seat = Some(next);
        next
    }

    /// Starts a new hand: rotates the button, shuffles a fresh deck with
    /// the table's RNG, and posts blinds/antes for every eligible seat.
    pub fn begin_hand(&mut self) -> Result<Hand, TableError> {
        let eligible = self.eligible_for_next_hand();
        let need = self.config.min_players.max(2);
        if eligible.len() < need {
            return Err(TableError::NotEnoughPlayers { have: eligible.len(), need });
        }

        if self.config.infinite_bankroll {
            for &seat in &eligible {
                if let Some(s) = self.seats[seat].as_mut() {
                    s.stack = self.config.start_chips;
                }
            }
        }

        let button = self.advance_button(&eligible);
        let players: Vec<(usize, u64)> = eligible
            .iter()
            .map(|&seat| (seat, self.seats[seat].as_ref().unwrap().stack))
            .collect();

        self.hand_counter += 1;
        let deck = Deck::shuffled(&mut self.rng);
        Hand::start(
            self.hand_counter,
            self.seats.len(),
            &players,
            button,
            self.config.small_blind,
            self.config.big_blind,
            self.config.ante,
            deck,
        )
        .map_err(|_| TableError::NotEnoughPlayers { have: eligible.len(), need })
    }

    /// Reconciles a finished hand's net chip changes back into the
    /// table's persistent seats, and marks any seat that busted to zero
    /// as sitting out until it rebuys.
    pub fn apply_outcome(&mut self, outcome: &HandOutcome) {
        if self.config.infinite_bankroll {
            return;
        }
        for (&seat, &net) in &outcome.net_chips {
            if let Some(s) = self.seats[seat].as_mut() {
                let new_stack = s.stack as i64 + net;
                s.stack = new_stack.max(0) as u64;
                if s.stack == 0 {
                    s.sitting_out = true;
                }
            }
        }
    }

    pub fn rebuy(&mut self, seat: usize, amount: u64) -> Result<(), TableError> {
        let s = self.seats.get_mut(seat).and_then(|s| s.as_mut()).ok_or(TableError::SeatEmpty(seat))?;
        s.stack += amount;
        s.sitting_out = false;
        Ok(())
    }
}
