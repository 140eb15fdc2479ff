//! Hand-history monitor: a `HandMonitor` that appends one JSON record per
//! completed hand, carrying enough information to replay the hand's
//! outcome. Keeps a running log alongside the table's pure accounting
//! rather than folding it into the accounting itself.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use engine::{ActionRecord, HandMonitor, HandOutcome, Street};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct HandRecord<'a> {
    hand_id: u64,
    button_seat: usize,
    seats: &'a [usize],
    actions: Vec<ActionRecordView<'a>>,
    board: &'a [engine::Card],
    went_to_showdown: bool,
    revealed_hole_cards: &'a std::collections::BTreeMap<usize, (engine::Card, engine::Card)>,
    net_chips: &'a std::collections::BTreeMap<usize, i64>,
}

#[derive(Debug, Serialize)]
struct ActionRecordView<'a> {
    seat: usize,
    street: &'a str,
    kind: &'a str,
    amount: Option<u64>,
    defaulted: bool,
}

fn street_name(street: Street) -> &'static str {
    match street {
        Street::Preflop => "preflop",
        Street::Flop => "flop",
        Street::Turn => "turn",
        Street::River => "river",
        Street::Showdown => "showdown",
        Street::Complete => "complete",
    }
}

fn action_kind_name(kind: engine::ActionKind) -> &'static str {
    match kind {
        engine::ActionKind::Fold => "fold",
        engine::ActionKind::Check => "check",
        engine::ActionKind::Call => "call",
        engine::ActionKind::Bet => "bet",
        engine::ActionKind::Raise => "raise",
        engine::ActionKind::AllIn => "all_in",
    }
}

/// Appends one JSON line per completed hand to the file at `path`.
/// Buffers the current hand's action log in memory between
/// `on_hand_start` and `on_hand_complete`, then writes and flushes a
/// single record — never blocking on I/O mid-hand beyond a local file
/// append (no network I/O is ever involved).
pub struct JsonlHandHistoryMonitor {
    file: File,
    button_seat: usize,
    seats: Vec<usize>,
    actions: Vec<ActionRecord>,
}

impl JsonlHandHistoryMonitor {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file, button_seat: 0, seats: Vec::new(), actions: Vec::new() })
    }
}

impl HandMonitor for JsonlHandHistoryMonitor {
    fn on_hand_start(&mut self, _hand_id: u64, button_seat: usize, seats: &[usize]) {
        self.button_seat = button_seat;
        self.seats = seats.to_vec();
        self.actions.clear();
    }

    fn on_player_action(&mut self, _hand_id: u64, record: &ActionRecord) {
        self.actions.push(record.clone());
    }

    fn on_hand_complete(&mut self, outcome: &HandOutcome) {
        let record = HandRecord {
            hand_id: outcome.hand_id,
            button_seat: self.button_seat,
            seats: &self.seats,
            actions: self
                .actions
                .iter()
                .map(|r| ActionRecordView {
                    seat: r.seat,
                    street: street_name(r.street),
                    kind: action_kind_name(r.kind),
                    amount: r.amount,
                    defaulted: r.defaulted,
                })
                .collect(),
            board: &outcome.board,
            went_to_showdown: outcome.went_to_showdown,
            revealed_hole_cards: &outcome.revealed_hole_cards,
            net_chips: &outcome.net_chips,
        };
        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(err) = writeln!(self.file, "{line}") {
                    warn!(%err, hand_id = outcome.hand_id, "failed to append hand history record");
                }
            }
            Err(err) => warn!(%err, hand_id = outcome.hand_id, "failed to serialize hand history record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{ActionKind, Street};
    use std::collections::BTreeMap;
    use std::io::{BufRead, BufReader};

    #[test]
    fn appends_one_json_line_per_completed_hand() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("hand_history_test_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut monitor = JsonlHandHistoryMonitor::create(&path).unwrap();
        monitor.on_hand_start(1, 0, &[0, 1]);
        monitor.on_player_action(
            1,
            &ActionRecord {
                seat: 0,
                street: Street::Preflop,
                kind: ActionKind::Call,
                amount: Some(10),
                remaining_stack: 990,
                defaulted: false,
            },
        );
        let mut net_chips = BTreeMap::new();
        net_chips.insert(0, -10i64);
        net_chips.insert(1, 10i64);
        monitor.on_hand_complete(&HandOutcome {
            hand_id: 1,
            net_chips,
            went_to_showdown: false,
            revealed_hole_cards: BTreeMap::new(),
            board: Vec::new(),
            awards: Vec::new(),
            invariant_violated: false,
        });
        drop(monitor);

        let lines: Vec<String> = BufReader::new(File::open(&path).unwrap())
            .lines()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed["hand_id"], 1);
        assert_eq!(parsed["actions"][0]["kind"], "call");

        let _ = std::fs::remove_file(&path);
    }
}
