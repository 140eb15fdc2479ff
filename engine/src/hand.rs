//! The per-hand state machine: deal, post blinds/antes, run
//! preflop→flop→turn→river→showdown, and award pots.

use std::collections::BTreeMap;

use crate::card::{Card, Deck};
use crate::error::HandError;
use crate::eval::evaluate_hole_and_board;
use crate::pot::{self, Contribution, PotLayer};

/// A single betting street, plus the two non-betting phases that bracket a
/// hand. `DealingHole` never appears as a public `street` value — it is
/// folded into `Hand::start`, which performs the deal-and-post-blinds step
/// atomically before returning the hand already positioned in
/// `Street::Preflop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Complete,
}

/// One seat's mutable state for the duration of a single hand.
#[derive(Debug, Clone)]
pub struct SeatInHand {
    pub stack: u64,
    pub hole: (Card, Card),
    pub folded: bool,
    pub all_in: bool,
    pub bet_this_round: u64,
    pub total_invested: u64,
    pub acted_this_round: bool,
    /// Set when a short all-in raise passes this seat by after it has
    /// already acted; while set, this seat may only call or fold, never
    /// raise, until a full raise clears it.
    pub reraise_blocked: bool,
}

/// The action a seat takes. `Call`/`Check` are kept distinct at the engine
/// layer for clarity even though the wire protocol unifies them into one
/// `call` token with `to_call == 0` meaning check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Fold,
    Check,
    Call,
    /// Opens the betting for the street to the given *total* this round.
    Bet(u64),
    /// Raises the street's current bet to the given *total* this round.
    Raise(u64),
    AllIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

impl From<&Action> for ActionKind {
    fn from(a: &Action) -> Self {
        match a {
            Action::Fold => ActionKind::Fold,
            Action::Check => ActionKind::Check,
            Action::Call => ActionKind::Call,
            Action::Bet(_) => ActionKind::Bet,
            Action::Raise(_) => ActionKind::Raise,
            Action::AllIn => ActionKind::AllIn,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub seat: usize,
    pub street: Street,
    pub kind: ActionKind,
    pub amount: Option<u64>,
    pub remaining_stack: u64,
    /// True when the engine substituted this action for the seat — either
    /// because of a decision timeout or an illegal request from the
    /// client (the server layer distinguishes the two in its own log).
    pub defaulted: bool,
}

/// What a seat is legally allowed to do right now.
#[derive(Debug, Clone, Copy)]
pub struct LegalActions {
    pub to_call: u64,
    pub min_bet: u64,
    pub min_raise_to: u64,
    pub max_total: u64,
    pub can_fold: bool,
    pub can_check: bool,
    pub can_call: bool,
    pub can_bet: bool,
    pub can_raise: bool,
    pub can_all_in: bool,
}

/// Result of applying one action: whether the betting round just closed
/// and, if so, what happened next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Betting continues; `to_act` has moved to the next seat.
    Continue,
    /// The street's betting closed and a new street began.
    StreetAdvanced(Street),
    /// Only one non-folded seat remains; the hand is over without a
    /// showdown.
    WonWithoutShowdown,
    /// River betting closed with multiple contestants; showdown resolved
    /// and the hand is complete.
    ShowdownComplete,
}

#[derive(Debug, Clone)]
pub struct PotAward {
    pub amount: u64,
    pub winners: Vec<usize>,
    pub uncalled_refund: bool,
}

#[derive(Debug, Clone)]
pub struct HandOutcome {
    pub hand_id: u64,
    pub net_chips: BTreeMap<usize, i64>,
    pub went_to_showdown: bool,
    pub revealed_hole_cards: BTreeMap<usize, (Card, Card)>,
    pub board: Vec<Card>,
    pub awards: Vec<PotAward>,
    /// Set when the chips paid out don't sum back to what was staked —
    /// a bug elsewhere in the pot math, not a reachable game state.
    /// `net_chips` is zeroed out whenever this is set, so applying the
    /// outcome refunds every seat to its pre-hand stack instead of
    /// paying out whatever the broken math produced.
    pub invariant_violated: bool,
}

/// One hand, from deal to award. Owns its own copy of every seated
/// player's stack for the duration; the caller (`Table`) reconciles
/// `HandOutcome::net_chips` back into its persistent seats once the hand
/// completes.
pub struct Hand {
    pub hand_id: u64,
    pub button_seat: usize,
    pub small_blind: u64,
    pub big_blind: u64,
    pub ante: u64,
    pub street: Street,
    pub board: Vec<Card>,
    /// Indexed by table seat number; `None` for seats not dealt into this
    /// hand.
    pub seats: Vec<Option<SeatInHand>>,
    pub current_bet: u64,
    pub last_raise_increment: u64,
    pub to_act: Option<usize>,
    pub action_log: Vec<ActionRecord>,
    deck: Deck,
}

impl Hand {
    /// Deals hole cards and posts blinds/antes for a new hand. `players`
    /// lists the table seats participating, in table order, as
    /// `(seat_number, starting_stack)`. `button_seat` must be one of them.
    ///
    /// Heads-up posts the button as small blind, the one exception to the
    /// usual SB/BB-left-of-button rule.
    pub fn start(
        hand_id: u64,
        max_seats: usize,
        players: &[(usize, u64)],
        button_seat: usize,
        small_blind: u64,
        big_blind: u64,
        ante: u64,
        mut deck: Deck,
    ) -> Result<Self, HandError> {
        let mut seats: Vec<Option<SeatInHand>> = vec![None; max_seats];
        let order: Vec<usize> = players.iter().map(|(s, _)| *s).collect();

        for &(seat, stack) in players {
            let hole = (
                deck.deal().ok_or(HandError::DeckExhausted)?,
                deck.deal().ok_or(HandError::DeckExhausted)?,
            );
            seats[seat] = Some(SeatInHand {
                stack,
                hole,
                folded: false,
                all_in: stack == 0,
                bet_this_round: 0,
                total_invested: 0,
                acted_this_round: false,
                reraise_blocked: false,
            });
        }

        let mut hand = Hand {
            hand_id,
            button_seat,
            small_blind,
            big_blind,
            ante,
            street: Street::Preflop,
            board: Vec::new(),
            seats,
            current_bet: 0,
            last_raise_increment: big_blind,
            to_act: None,
            action_log: Vec::new(),
            deck,
        };

        if ante > 0 {
            for &seat in &order {
                hand.post(seat, ante);
            }
        }

        let heads_up = order.len() == 2;
        let (sb_seat, bb_seat) = if heads_up {
            let sb = button_seat;
            let bb = next_seat_in(&order, button_seat);
            (sb, bb)
        } else {
            let sb = next_seat_in(&order, button_seat);
            let bb = next_seat_in(&order, sb);
            (sb, bb)
        };
        hand.post(sb_seat, small_blind);
        hand.post(bb_seat, big_blind);
        hand.current_bet = hand.seats[bb_seat].as_ref().map(|s| s.bet_this_round).unwrap_or(0);

        let first_to_act = if heads_up {
            sb_seat
        } else {
            next_seat_in(&order, bb_seat)
        };
        hand.to_act = hand.find_next_to_act(first_to_act, true);

        Ok(hand)
    }

    fn post(&mut self, seat: usize, amount: u64) {
        if let Some(s) = self.seats[seat].as_mut() {
            let paid = amount.min(s.stack);
            s.stack -= paid;
            s.bet_this_round += paid;
            s.total_invested += paid;
            if s.stack == 0 {
                s.all_in = true;
            }
        }
    }

    fn find_next_to_act(&self, from: usize, include_from: bool) -> Option<usize> {
        let n = self.seats.len();
        let mut idx = from;
        if !include_from {
            idx = (idx + 1) % n;
        }
        for _ in 0..n {
            if let Some(seat) = self.seats[idx].as_ref() {
                if !seat.folded && !seat.all_in {
                    return Some(idx);
                }
            }
            idx = (idx + 1) % n;
        }
        None
    }

    fn non_folded_seats(&self) -> Vec<usize> {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().filter(|s| !s.folded).map(|_| i))
            .collect()
    }

    /// Legal actions for whichever seat is currently `to_act`. Returns
    /// `None` if the hand has no seat to act (street closed or complete).
    pub fn legal_actions(&self) -> Option<LegalActions> {
        let seat_idx = self.to_act?;
        let seat = self.seats[seat_idx].as_ref()?;
        let to_call = self.current_bet.saturating_sub(seat.bet_this_round);
        let max_total = seat.stack + seat.bet_this_round;
        let min_raise_to = self.current_bet + self.last_raise_increment;

        if to_call == 0 {
            Some(LegalActions {
                to_call: 0,
                min_bet: self.big_blind,
                min_raise_to,
                max_total,
                can_fold: true,
                can_check: true,
                can_call: false,
                can_bet: max_total > self.current_bet,
                can_raise: false,
                can_all_in: seat.stack > 0,
            })
        } else {
            Some(LegalActions {
                to_call,
                min_bet: self.big_blind,
                min_raise_to,
                max_total,
                can_fold: true,
                can_check: false,
                can_call: true,
                can_bet: false,
                can_raise: !seat.reraise_blocked && max_total > self.current_bet,
                can_all_in: seat.stack > 0,
            })
        }
    }

    /// Applies `action` on behalf of `seat`, which must be the seat
    /// currently `to_act`.
    pub fn apply_action(&mut self, seat: usize, action: Action) -> Result<StepResult, HandError> {
        self.apply_action_inner(seat, action, false)
    }

    /// Substitutes the defensive action for the seat currently `to_act`
    /// (check if legal, else fold) and marks the log entry `defaulted`.
    /// Used by the caller both for decision timeouts and for illegal
    /// client requests.
    pub fn apply_default_action(&mut self, seat: usize) -> Result<(Action, StepResult), HandError> {
        let legal = self
            .legal_actions()
            .filter(|_| self.to_act == Some(seat))
            .ok_or(HandError::NotYourTurn(seat))?;
        let action = if legal.can_check { Action::Check } else { Action::Fold };
        let result = self.apply_action_inner(seat, action, true)?;
        Ok((action, result))
    }

    /// Forces a fold for the seat currently `to_act`, even when check
    /// would have been legal. For a seat whose connection is unhealthy —
    /// disconnected, or backpressured past the watermark — the engine
    /// does not extend it a free check; it auto-folds every action owed
    /// to it until it leaves the hand.
    pub fn apply_forced_fold(&mut self, seat: usize) -> Result<StepResult, HandError> {
        self.legal_actions()
            .filter(|_| self.to_act == Some(seat))
            .ok_or(HandError::NotYourTurn(seat))?;
        self.apply_action_inner(seat, Action::Fold, true)
    }

    fn apply_action_inner(
        &mut self,
        seat: usize,
        action: Action,
        defaulted: bool,
    ) -> Result<StepResult, HandError> {
        if self.street == Street::Showdown || self.street == Street::Complete {
            return Err(HandError::HandAlreadyComplete(self.street));
        }
        if self.to_act != Some(seat) {
            return Err(HandError::NotYourTurn(seat));
        }
        let legal = self.legal_actions().ok_or(HandError::SeatNotActing(seat))?;

        let kind = ActionKind::from(&action);
        let mut amount_logged = None;

        match action {
            Action::Fold => {
                if !legal.can_fold {
                    return Err(HandError::IllegalAction("fold not available".into()));
                }
                let s = self.seats[seat].as_mut().unwrap();
                s.folded = true;
                s.acted_this_round = true;
            }
            Action::Check => {
                if !legal.can_check {
                    return Err(HandError::IllegalAction("check not available".into()));
                }
                let s = self.seats[seat].as_mut().unwrap();
                s.acted_this_round = true;
            }
            Action::Call => {
                if !legal.can_call {
                    return Err(HandError::IllegalAction("call not available".into()));
                }
                self.commit_to(seat, self.current_bet.min(self.seat_max_total(seat)));
                amount_logged = Some(legal.to_call);
                self.seats[seat].as_mut().unwrap().acted_this_round = true;
            }
            Action::Bet(total) => {
                if !legal.can_bet {
                    return Err(HandError::IllegalAction("bet not available".into()));
                }
                let max_total = legal.max_total;
                if total > max_total {
                    return Err(HandError::AmountOutOfRange { amount: total, min: legal.min_bet, max: max_total });
                }
                if self.current_bet == 0 {
                    if total < legal.min_bet && total < max_total {
                        return Err(HandError::AmountOutOfRange { amount: total, min: legal.min_bet, max: max_total });
                    }
                    self.open_bet(seat, total, total >= legal.min_bet);
                } else {
                    // `to_call == 0` with `current_bet > 0` is the BB-option
                    // spot: the street is unraised past the BB, but the BB
                    // still owes nothing to call. A `Bet` here is really a
                    // raise-to, so it's bounded by `min_raise_to` like any
                    // other raise.
                    let min_raise_to = legal.min_raise_to;
                    if total < min_raise_to && total < max_total {
                        return Err(HandError::AmountOutOfRange { amount: total, min: min_raise_to, max: max_total });
                    }
                    let is_full_raise = total >= min_raise_to;
                    self.open_bet(seat, total, is_full_raise);
                }
                amount_logged = Some(total);
            }
            Action::Raise(total) => {
                if !legal.can_raise {
                    return Err(HandError::IllegalAction("raise not available".into()));
                }
                let max_total = legal.max_total;
                if total > max_total {
                    return Err(HandError::AmountOutOfRange { amount: total, min: legal.min_raise_to, max: max_total });
                }
                if total < self.current_bet {
                    return Err(HandError::AmountOutOfRange { amount: total, min: legal.min_raise_to, max: max_total });
                }
                let is_full_raise = total >= legal.min_raise_to;
                if !is_full_raise && total < max_total {
                    return Err(HandError::AmountOutOfRange { amount: total, min: legal.min_raise_to, max: max_total });
                }
                self.open_bet(seat, total, is_full_raise);
                amount_logged = Some(total);
            }
            Action::AllIn => {
                if !legal.can_all_in {
                    return Err(HandError::IllegalAction("all-in not available".into()));
                }
                let total = legal.max_total;
                if total <= self.current_bet {
                    self.commit_to(seat, total);
                    self.seats[seat].as_mut().unwrap().acted_this_round = true;
                } else {
                    let is_full_raise = total >= legal.min_raise_to;
                    self.open_bet(seat, total, is_full_raise);
                }
                amount_logged = Some(total);
            }
        }

        let remaining_stack = self.seats[seat].as_ref().unwrap().stack;
        self.action_log.push(ActionRecord {
            seat,
            street: self.street,
            kind,
            amount: amount_logged,
            remaining_stack,
            defaulted,
        });

        self.advance()
    }

    fn seat_max_total(&self, seat: usize) -> u64 {
        self.seats[seat]
            .as_ref()
            .map(|s| s.stack + s.bet_this_round)
            .unwrap_or(0)
    }

    /// Commits `total` as the seat's new bet-this-round (used for calls,
    /// including all-in calls for less than the full bet).
    fn commit_to(&mut self, seat: usize, total: u64) {
        let s = self.seats[seat].as_mut().unwrap();
        let delta = total.saturating_sub(s.bet_this_round);
        let paid = delta.min(s.stack);
        s.stack -= paid;
        s.bet_this_round += paid;
        s.total_invested += paid;
        if s.stack == 0 {
            s.all_in = true;
        }
    }

    /// Commits `total` as a bet or raise, updating `current_bet` and
    /// reopening or restricting other seats' raise rights.
    fn open_bet(&mut self, seat: usize, total: u64, is_full_raise: bool) {
        let previous_bet = self.current_bet;
        self.commit_to(seat, total);
        self.current_bet = total;
        self.seats[seat].as_mut().unwrap().acted_this_round = true;
        self.seats[seat].as_mut().unwrap().reraise_blocked = false;

        if is_full_raise {
            self.last_raise_increment = total - previous_bet;
            for (idx, other) in self.seats.iter_mut().enumerate() {
                if idx == seat {
                    continue;
                }
                if let Some(other) = other {
                    if !other.folded && !other.all_in {
                        other.acted_this_round = false;
                        other.reraise_blocked = false;
                    }
                }
            }
        } else {
            for (idx, other) in self.seats.iter_mut().enumerate() {
                if idx == seat {
                    continue;
                }
                if let Some(other) = other {
                    if !other.folded && !other.all_in && other.acted_this_round {
                        other.reraise_blocked = true;
                    }
                }
            }
        }
    }

    /// After an action, decide whether the round/street/hand advances.
    fn advance(&mut self) -> Result<StepResult, HandError> {
        let non_folded = self.non_folded_seats();
        if non_folded.len() <= 1 {
            self.street = Street::Complete;
            self.to_act = None;
            return Ok(StepResult::WonWithoutShowdown);
        }

        if !self.round_closed() {
            let current = self.to_act.unwrap();
            self.to_act = self.find_next_to_act(current, false);
            // If nobody can act (everyone left is all-in), the round is
            // effectively closed even though not everyone "acted" this
            // round in the bookkeeping sense.
            if self.to_act.is_none() {
                return self.close_round();
            }
            return Ok(StepResult::Continue);
        }

        self.close_round()
    }

    fn round_closed(&self) -> bool {
        let contesting: Vec<&SeatInHand> = self
            .seats
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(|s| !s.folded && !s.all_in)
            .collect();
        if contesting.is_empty() {
            return true;
        }
        contesting
            .iter()
            .all(|s| s.acted_this_round && s.bet_this_round == self.current_bet)
    }

    fn close_round(&mut self) -> Result<StepResult, HandError> {
        for seat in self.seats.iter_mut().filter_map(|s| s.as_mut()) {
            seat.bet_this_round = 0;
            seat.acted_this_round = false;
            seat.reraise_blocked = false;
        }
        self.current_bet = 0;
        self.last_raise_increment = self.big_blind;

        match self.street {
            Street::Preflop => {
                if self.deck.remaining() < 3 {
                    return Err(HandError::DeckExhausted);
                }
                self.board.extend(self.deck.deal_n(3));
                self.street = Street::Flop;
            }
            Street::Flop => {
                if self.deck.remaining() < 1 {
                    return Err(HandError::DeckExhausted);
                }
                self.board.extend(self.deck.deal_n(1));
                self.street = Street::Turn;
            }
            Street::Turn => {
                if self.deck.remaining() < 1 {
                    return Err(HandError::DeckExhausted);
                }
                self.board.extend(self.deck.deal_n(1));
                self.street = Street::River;
            }
            Street::River => {
                self.street = Street::Showdown;
                self.to_act = None;
                return Ok(StepResult::ShowdownComplete);
            }
            Street::Showdown | Street::Complete => unreachable!(),
        }

        // first-to-act postflop is the first non-folded, non-all-in seat
        // left of the button
        self.to_act = self.find_next_to_act(self.button_seat, false);

        if self.to_act.is_none() {
            // everyone left is all-in: keep dealing streets automatically
            return self.run_out_remaining_streets();
        }

        Ok(StepResult::StreetAdvanced(self.street))
    }

    /// When no seat can act anymore (everyone non-folded is all-in), deal
    /// the rest of the board without further betting and land on
    /// showdown.
    fn run_out_remaining_streets(&mut self) -> Result<StepResult, HandError> {
        loop {
            match self.street {
                Street::Showdown | Street::Complete => break,
                _ => {}
            }
            match self.close_round_no_act_check()? {
                Street::Showdown => break,
                _ => continue,
            }
        }
        Ok(StepResult::ShowdownComplete)
    }

    fn close_round_no_act_check(&mut self) -> Result<Street, HandError> {
        match self.street {
            Street::Preflop => {
                if self.deck.remaining() >= 3 {
                    self.board.extend(self.deck.deal_n(3));
                }
                self.street = Street::Flop;
            }
            Street::Flop => {
                if self.deck.remaining() >= 1 {
                    self.board.extend(self.deck.deal_n(1));
                }
                self.street = Street::Turn;
            }
            Street::Turn => {
                if self.deck.remaining() >= 1 {
                    self.board.extend(self.deck.deal_n(1));
                }
                self.street = Street::River;
            }
            Street::River => {
                self.street = Street::Showdown;
            }
            Street::Showdown | Street::Complete => {}
        }
        Ok(self.street)
    }

    /// Resolves the hand once it has reached `Complete` (folded out) or
    /// `Showdown`, producing the final outcome. Consumes the hand.
    pub fn finish(mut self) -> HandOutcome {
        let starting: BTreeMap<usize, u64> = self
            .seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s.stack + s.total_invested)))
            .collect();

        let contributions: Vec<Contribution> = self
            .seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.as_ref().map(|s| Contribution {
                    seat: i,
                    invested: s.total_invested,
                    folded: s.folded,
                })
            })
            .collect();
        let layers: Vec<PotLayer> = pot::build_layers(&contributions);

        let non_folded = self.non_folded_seats();
        let went_to_showdown = self.street == Street::Showdown && non_folded.len() > 1;

        let mut scores = BTreeMap::new();
        let mut revealed = BTreeMap::new();
        if went_to_showdown {
            for &seat in &non_folded {
                let s = self.seats[seat].as_ref().unwrap();
                let score = evaluate_hole_and_board(s.hole, &self.board);
                scores.insert(seat, score);
                revealed.insert(seat, s.hole);
            }
        } else if let Some(&winner) = non_folded.first() {
            // Single seat remains: award outright without revealing.
            for layer in &layers {
                if layer.eligible.contains(&winner) {
                    scores.entry(winner).or_insert_with(|| {
                        evaluate_hole_and_board(self.seats[winner].as_ref().unwrap().hole, &self.board)
                    });
                }
            }
        }

        let winnings = pot::award(&layers, &scores, self.button_seat, self.seats.len());

        let awards: Vec<PotAward> = layers
            .iter()
            .map(|l| PotAward {
                amount: l.amount,
                winners: if l.uncalled_refund {
                    l.eligible.clone()
                } else {
                    winnings
                        .iter()
                        .filter(|(seat, _)| l.eligible.contains(seat))
                        .map(|(seat, _)| *seat)
                        .collect()
                },
                uncalled_refund: l.uncalled_refund,
            })
            .collect();

        for (seat, s) in self.seats.iter_mut().enumerate() {
            if let Some(s) = s {
                s.stack += winnings.get(&seat).copied().unwrap_or(0);
            }
        }

        let mut net_chips: BTreeMap<usize, i64> = self
            .seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.as_ref().map(|s| {
                    let start = *starting.get(&i).unwrap_or(&0) as i64;
                    (i, s.stack as i64 - start)
                })
            })
            .collect();

        // Every chip paid in must come back out across all seats; a
        // nonzero sum means the pot math shipped a seat more or less
        // than it staked. Refund everyone to their pre-hand stack rather
        // than apply a result that can't balance the table.
        let invariant_violated = net_chips.values().sum::<i64>() != 0;
        if invariant_violated {
            for net in net_chips.values_mut() {
                *net = 0;
            }
        }

        self.street = Street::Complete;

        HandOutcome {
            hand_id: self.hand_id,
            net_chips,
            went_to_showdown,
            revealed_hole_cards: revealed,
            board: self.board,
            awards,
            invariant_violated,
        }
    }
}

fn next_seat_in(order: &[usize], from: usize) -> usize {
    let pos = order.iter().position(|&s| s == from).unwrap_or(0);
    order[(pos + 1) % order.len()]
}
