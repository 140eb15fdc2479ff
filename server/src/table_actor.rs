//! Table actor (async half): one cooperative task per table that is
//! the single writer of all hand and seat state. Wraps a synchronous
//! `engine::Table`/`engine::Hand` and drives it against real I/O through
//! a single mailbox, racing each decision against a timeout and a
//! cancellation signal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use engine::{Action, ActionRecord, Hand, HandMonitor, HandOutcome, LegalActions, StepResult, Table, TableConfig};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use crate::error::{AdmissionError, AuthError, DirectorError};
use crate::protocol::{
    street_wire_name, ErrorCode, SeatSummary, ServerEvent, ShowdownEntry, WinnerSummary, WireActionKind,
};
use crate::session::{ConnectionState, SessionHandle};
use crate::stats::GameStats;
use crate::protocol::ClientCommand;

/// Messages a table actor accepts through its single mailbox. Everything
/// that can happen to a table — a new participant authenticating, or a
/// seated participant's command — funnels through here.
pub enum TableMsg {
    Join {
        name: String,
        buy_in: Option<u64>,
        outbound: mpsc::Sender<ServerEvent>,
        reply: oneshot::Sender<Result<JoinAck, DirectorError>>,
    },
    Command {
        seat: usize,
        command: ClientCommand,
    },
}

pub struct JoinAck {
    pub table_id: String,
    pub seat: usize,
    pub stack: u64,
}

struct PendingJoin {
    name: String,
    buy_in: Option<u64>,
    outbound: mpsc::Sender<ServerEvent>,
    reply: oneshot::Sender<Result<JoinAck, DirectorError>>,
}

/// What happened while we were waiting for a seat's decision.
enum Decision {
    Response { kind: WireActionKind, amount: Option<u64> },
    Timeout,
    Cancelled,
}

enum HandOutcomeKind {
    Completed,
    Cancelled,
}

pub struct TableActor {
    table_id: String,
    table: Table,
    mailbox: mpsc::UnboundedReceiver<TableMsg>,
    sessions: HashMap<usize, SessionHandle>,
    pending_joins: Vec<PendingJoin>,
    pending_leaves: HashSet<usize>,
    monitors: Vec<Box<dyn HandMonitor>>,
    stats: Arc<GameStats>,
    decision_timeout: Duration,
    hand_limit: Option<u64>,
    cancellation: watch::Receiver<bool>,
}

/// Spawns a table actor task and returns the mailbox handle used to join
/// participants and route their commands to it.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    table_id: impl Into<String>,
    config: TableConfig,
    seed: u64,
    decision_timeout: Duration,
    hand_limit: Option<u64>,
    monitors: Vec<Box<dyn HandMonitor>>,
    stats: Arc<GameStats>,
    cancellation: watch::Receiver<bool>,
) -> mpsc::UnboundedSender<TableMsg> {
    let table_id = table_id.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = TableActor {
        table: Table::new(table_id.clone(), config, seed),
        table_id,
        mailbox: rx,
        sessions: HashMap::new(),
        pending_joins: Vec::new(),
        pending_leaves: HashSet::new(),
        monitors,
        stats,
        decision_timeout,
        hand_limit,
    cancellation,
    };
    tokio::spawn(actor.run());
    tx
}

impl TableActor {
    pub async fn run(mut self) {
        for m in self.monitors.iter_mut() {
            m.on_game_start(&self.table_id, self.table.seats.len());
        }

        let reason = loop {
            if *self.cancellation.borrow() {
                break "shutdown";
            }
            if let Some(limit) = self.hand_limit {
                if self.table.hand_counter >= limit {
                    break "hand_limit";
                }
            }

            self.drive_between_hands();

            let min_players = self.table.config.min_players.max(2);
            if self.table.occupied_seats() < min_players {
                if !self.wait_for_players().await {
                    break "shutdown";
                }
                continue;
            }

            let hand = match self.table.begin_hand() {
                Ok(hand) => hand,
                Err(_) => continue,
            };

            match self.run_hand(hand).await {
                HandOutcomeKind::Completed => {}
                HandOutcomeKind::Cancelled => break "shutdown",
            }
        };

        info!(table_id = %self.table_id, hands = self.table.hand_counter, reason, "table shutting down");
        for m in self.monitors.iter_mut() {
            m.on_game_complete(&self.table_id, self.table.hand_counter);
        }
        self.broadcast(ServerEvent::GameCompleted {
            hands_completed: self.table.hand_counter,
            reason: reason.to_string(),
        });
    }

    /// Applies anything queued mid-hand (joins waiting for a free seat,
    /// leaves waiting to take effect) now that no hand is in progress.
    fn drive_between_hands(&mut self) {
        for join in std::mem::take(&mut self.pending_joins) {
            self.admit(join);
        }
        for seat in std::mem::take(&mut self.pending_leaves) {
            self.eject(seat);
        }
    }

    /// Blocks until enough players are seated to start a hand, servicing
    /// joins/leaves as they arrive. Returns `false` if the table should
    /// shut down instead.
    async fn wait_for_players(&mut self) -> bool {
        loop {
            tokio::select! {
                changed = self.cancellation.changed() => {
                    if changed.is_err() || *self.cancellation.borrow() {
                        return false;
                    }
                }
                msg = self.mailbox.recv() => {
                    match msg {
                        None => return false,
                        Some(TableMsg::Join { name, buy_in, outbound, reply }) => {
                            self.admit(PendingJoin { name, buy_in, outbound, reply });
                        }
                        Some(TableMsg::Command { seat, command: ClientCommand::Leave {} }) => self.eject(seat),
                        Some(TableMsg::Command { .. }) => {}
                    }
                }
            }
            if self.table.occupied_seats() >= self.table.config.min_players.max(2) {
                return true;
            }
        }
    }

    fn admit(&mut self, join: PendingJoin) {
        if self.sessions.values().any(|s| s.player_name == join.name) {
            let _ = join.reply.send(Err(AuthError::NameConflict(join.name).into()));
            return;
        }
        let Some(buy_in) = join.buy_in else {
            let _ = join.reply.send(Err(AuthError::MissingBuyIn.into()));
            return;
        };
        let Some(seat) = self.table.seats.iter().position(|s| s.is_none()) else {
            let _ = join.reply.send(Err(AdmissionError::TableFull(self.table_id.clone()).into()));
            return;
        };
        if self.table.seat_player(seat, buy_in).is_err() {
            let _ = join.reply.send(Err(AdmissionError::TableFull(self.table_id.clone()).into()));
            return;
        }
        info!(table_id = %self.table_id, seat, name = %join.name, buy_in, "player seated");
        self.sessions
            .insert(seat, SessionHandle::new(format!("{}-{}", self.table_id, seat), join.name.clone(), join.outbound));
        let _ = join.reply.send(Ok(JoinAck { table_id: self.table_id.clone(), seat, stack: buy_in }));
    }

    fn eject(&mut self, seat: usize) {
        if let Some(session) = self.sessions.remove(&seat) {
            info!(table_id = %self.table_id, seat, name = %session.player_name, "player left");
        }
        let _ = self.table.remove_player(seat);
    }

    async fn run_hand(&mut self, mut hand: Hand) -> HandOutcomeKind {
        let seats_in_hand: Vec<usize> = hand
            .seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect();
        self.announce_hand_start(&hand);
        for m in self.monitors.iter_mut() {
            m.on_hand_start(hand.hand_id, hand.button_seat, &seats_in_hand);
        }

        loop {
            let Some(seat) = hand.to_act else { break };
            let legal = hand.legal_actions().expect("to_act implies legal_actions");

            let forced_default = self.sessions.get(&seat).map(|s| !s.is_healthy()).unwrap_or(true);
            let step = if forced_default {
                hand.apply_forced_fold(seat).expect("forced fold is always legal")
            } else {
                let request_id = self.sessions.get_mut(&seat).unwrap().new_request_id();
                self.send_action_request(&hand, seat, &legal, request_id);
                match self.await_decision(seat, request_id).await {
                    Decision::Cancelled => return HandOutcomeKind::Cancelled,
                    Decision::Timeout => {
                        self.stats.record_timeout();
                        if let Some(s) = self.sessions.get_mut(&seat) {
                            s.consecutive_timeouts += 1;
                            if s.consecutive_timeouts >= 3 {
                                s.state = ConnectionState::DisconnectedGrace;
                            }
                        }
                        hand.apply_forced_fold(seat).expect("forced fold is always legal")
                    }
                    Decision::Response { kind, amount } => {
                        if let Some(s) = self.sessions.get_mut(&seat) {
                            s.consecutive_timeouts = 0;
                        }
                        let action = to_engine_action(kind, amount, legal.to_call);
                        match hand.apply_action(seat, action) {
                            Ok(step) => step,
                            Err(err) => {
                                warn!(table_id = %self.table_id, seat, %err, "illegal action substituted");
                                self.stats.record_fault();
                                if let Some(s) = self.sessions.get_mut(&seat) {
                                    s.send(ServerEvent::Error {
                                        code: ErrorCode::IllegalAction,
                                        message: err.to_string(),
                                    });
                                }
                                let (_, step) =
                                    hand.apply_default_action(seat).expect("default action is always legal");
                                step
                            }
                        }
                    }
                }
            };

            let record = hand.action_log.last().cloned().expect("an action was just applied");
            self.broadcast_player_action(hand.hand_id, &record);
            for m in self.monitors.iter_mut() {
                m.on_player_action(hand.hand_id, &record);
            }

            match step {
                StepResult::Continue => {}
                StepResult::StreetAdvanced(street) => {
                    self.broadcast(ServerEvent::StreetChange {
                        hand_id: hand.hand_id,
                        street: street_wire_name(street).to_string(),
                        board: hand.board.clone(),
                    });
                    for m in self.monitors.iter_mut() {
                        m.on_street_change(hand.hand_id, street, &hand.board);
                    }
                }
                StepResult::WonWithoutShowdown | StepResult::ShowdownComplete => break,
            }
        }

        let outcome = hand.finish();
        self.settle(outcome);
        HandOutcomeKind::Completed
    }

    /// Waits for the acting seat's `ActionResponse`, the decision timer,
    /// or cancellation — whichever fires first. Messages that don't
    /// resolve the current decision (stale responses, joins, leaves) are
    /// absorbed without restarting the timer.
    async fn await_decision(&mut self, seat: usize, expected_request_id: u64) -> Decision {
        let deadline = tokio::time::Instant::now() + self.decision_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::select! {
                _ = tokio::time::sleep(remaining) => return Decision::Timeout,
                changed = self.cancellation.changed() => {
                    if changed.is_err() || *self.cancellation.borrow() {
                        return Decision::Cancelled;
                    }
                }
                msg = self.mailbox.recv() => {
                    match msg {
                        None => return Decision::Cancelled,
                        Some(TableMsg::Join { name, buy_in, outbound, reply }) => {
                            // The table won't admit a new seat mid-hand; let the
                            // client know it's waiting rather than leaving it
                            // silently blocked on the join reply.
                            let _ = outbound.try_send(ServerEvent::Error {
                                code: ErrorCode::Queued,
                                message: "table is mid-hand, you'll be seated between hands".to_string(),
                            });
                            self.pending_joins.push(PendingJoin { name, buy_in, outbound, reply });
                        }
                        Some(TableMsg::Command { seat: s, command }) => match command {
                            ClientCommand::ActionResponse { request_id, action, amount } => {
                                if s == seat && request_id == expected_request_id {
                                    return Decision::Response { kind: action, amount };
                                }
                            }
                            ClientCommand::Leave {} => {
                                self.pending_leaves.insert(s);
                            }
                            ClientCommand::Auth { .. } => {}
                        },
                    }
                }
            }
        }
    }

    fn send_action_request(&mut self, hand: &Hand, seat: usize, legal: &LegalActions, request_id: u64) {
        let pot: u64 = hand.seats.iter().filter_map(|s| s.as_ref()).map(|s| s.total_invested).sum();
        let mut valid_actions = Vec::new();
        if legal.can_fold {
            valid_actions.push(WireActionKind::Fold);
        }
        if legal.can_check || legal.can_call {
            valid_actions.push(WireActionKind::Call);
        }
        if legal.can_bet {
            valid_actions.push(WireActionKind::Bet);
        }
        if legal.can_raise {
            valid_actions.push(WireActionKind::Raise);
        }
        if legal.can_all_in {
            valid_actions.push(WireActionKind::AllIn);
        }
        if let Some(session) = self.sessions.get_mut(&seat) {
            session.send(ServerEvent::ActionRequest {
                hand_id: hand.hand_id,
                request_id,
                to_call: legal.to_call,
                min_bet: legal.min_bet,
                min_raise: legal.min_raise_to,
                pot,
                valid_actions,
            });
        }
    }

    fn announce_hand_start(&mut self, hand: &Hand) {
        let players: Vec<SeatSummary> = hand
            .seats
            .iter()
            .enumerate()
            .filter_map(|(seat, s)| {
                s.as_ref().and_then(|s| {
                    self.sessions
                        .get(&seat)
                        .map(|session| SeatSummary { seat, name: session.player_name.clone(), chips: s.stack })
                })
            })
            .collect();

        for (&seat, session) in self.sessions.iter_mut() {
            let Some(seat_state) = hand.seats.get(seat).and_then(|s| s.as_ref()) else { continue };
            session.send(ServerEvent::HandStart {
                hand_id: hand.hand_id,
                your_seat: seat,
                button: hand.button_seat,
                small_blind: hand.small_blind,
                big_blind: hand.big_blind,
                players: players.clone(),
                your_hole_cards: seat_state.hole,
            });
        }
    }

    fn broadcast_player_action(&mut self, hand_id: u64, record: &ActionRecord) {
        self.broadcast(ServerEvent::PlayerAction {
            hand_id,
            seat: record.seat,
            action: wire_action_kind(record.kind),
            amount: record.amount,
            remaining_stack: record.remaining_stack,
            timeout: record.defaulted,
        });
    }

    /// Reports net chip change per seat as the wire `amount`, not each
    /// pot layer's gross award — simpler to compute from `HandOutcome`
    /// and a better number for a bot to track its own bankroll by.
    fn broadcast_hand_result(&mut self, outcome: &HandOutcome) {
        let total_pot: u64 = outcome.awards.iter().map(|a| a.amount).sum();
        let showdown: Vec<ShowdownEntry> = outcome
            .revealed_hole_cards
            .iter()
            .map(|(&seat, &hole_cards)| ShowdownEntry { seat, hole_cards })
            .collect();
        let winners: Vec<WinnerSummary> = outcome
            .net_chips
            .iter()
            .filter(|(_, &net)| net > 0)
            .filter_map(|(seat, &net)| {
                self.sessions.get(seat).map(|s| WinnerSummary {
                    name: s.player_name.clone(),
                    amount: net as u64,
                    hole_cards: outcome.revealed_hole_cards.get(seat).copied(),
                })
            })
            .collect();
        self.broadcast(ServerEvent::HandResult { hand_id: outcome.hand_id, winners, showdown, total_pot });
    }

    fn settle(&mut self, outcome: HandOutcome) {
        if outcome.invariant_violated {
            warn!(
                table_id = %self.table_id,
                hand_id = outcome.hand_id,
                "chip conservation invariant failed, aborting hand and refunding stakes"
            );
            self.broadcast(ServerEvent::Error {
                code: ErrorCode::Internal,
                message: "hand aborted: internal invariant failure, stakes refunded".to_string(),
            });
            self.table.apply_outcome(&outcome);
            return;
        }
        self.broadcast_hand_result(&outcome);
        for m in self.monitors.iter_mut() {
            m.on_hand_complete(&outcome);
        }
        let named_net: std::collections::BTreeMap<String, i64> = outcome
            .net_chips
            .iter()
            .filter_map(|(seat, &net)| self.sessions.get(seat).map(|s| (s.player_name.clone(), net)))
            .collect();
        self.stats.record_hand_completed(&named_net);
        self.table.apply_outcome(&outcome);
    }

    fn broadcast(&mut self, event: ServerEvent) {
        for session in self.sessions.values_mut() {
            session.send(event.clone());
        }
    }
}

fn to_engine_action(kind: WireActionKind, amount: Option<u64>, to_call: u64) -> Action {
    match kind {
        WireActionKind::Fold => Action::Fold,
        WireActionKind::Call => {
            if to_call == 0 {
                Action::Check
            } else {
                Action::Call
            }
        }
        WireActionKind::Bet => Action::Bet(amount.unwrap_or(0)),
        WireActionKind::Raise => Action::Raise(amount.unwrap_or(0)),
        WireActionKind::AllIn => Action::AllIn,
    }
}

fn wire_action_kind(kind: engine::ActionKind) -> WireActionKind {
    match kind {
        engine::ActionKind::Fold => WireActionKind::Fold,
        engine::ActionKind::Check | engine::ActionKind::Call => WireActionKind::Call,
        engine::ActionKind::Bet => WireActionKind::Bet,
        engine::ActionKind::Raise => WireActionKind::Raise,
        engine::ActionKind::AllIn => WireActionKind::AllIn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_call_token_means_check_when_nothing_owed() {
        assert_eq!(to_engine_action(WireActionKind::Call, None, 0), Action::Check);
        assert_eq!(to_engine_action(WireActionKind::Call, None, 25), Action::Call);
    }

    #[test]
    fn wire_action_kind_folds_check_and_call_into_one_token() {
        assert_eq!(wire_action_kind(engine::ActionKind::Check), WireActionKind::Call);
        assert_eq!(wire_action_kind(engine::ActionKind::Call), WireActionKind::Call);
        assert_eq!(wire_action_kind(engine::ActionKind::Fold), WireActionKind::Fold);
    }
}
