//! Game Director: owns the `game_id -> table` mapping, admits
//! connections to the right table, and cascades shutdown.
//!
//! Tables are created lazily on first `Auth` for a given `game_id` rather
//! than through an explicit create-table command. A `tokio::sync::watch`
//! broadcast carries cancellation down to every table actor at once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine::{HandMonitor, NullMonitor, TableConfig};
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{AdmissionError, DirectorError};
use crate::history::JsonlHandHistoryMonitor;
use crate::protocol::ClientCommand;
use crate::protocol::ServerEvent;
use crate::session::OUTBOUND_HIGH_WATERMARK;
use crate::stats::{GameStats, StatsSnapshot};
use crate::table_actor::{self, JoinAck, TableMsg};

#[derive(Clone)]
pub struct DirectorConfig {
    pub table: TableConfig,
    pub seed: u64,
    pub decision_timeout: Duration,
    pub hand_limit: Option<u64>,
    pub enable_stats: bool,
    pub hand_history_path: Option<PathBuf>,
}

/// What the Director keeps per running table: its mailbox and a handle to
/// its stats, cheap enough to clone out from under the admission lock.
struct GameHandle {
    mailbox: mpsc::UnboundedSender<TableMsg>,
    stats: Arc<GameStats>,
}

/// The result of successfully joining a table: everything the HTTP layer
/// needs to announce `Joined` and start pumping this session's events.
pub struct JoinedSession {
    pub table_id: String,
    pub seat: usize,
    pub stack: u64,
    pub outbound: mpsc::Receiver<ServerEvent>,
    /// A clone of the same sender the table actor holds for this seat.
    /// The HTTP reader loop uses this to deliver session-scoped `Error`
    /// events (malformed/unknown messages) directly, without routing
    /// them through the table's mailbox — the table loop has no opinion
    /// on a participant's protocol hygiene.
    pub outbound_tx: mpsc::Sender<ServerEvent>,
}

pub struct Director {
    config: DirectorConfig,
    games: Mutex<HashMap<String, GameHandle>>,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl Director {
    pub fn new(config: DirectorConfig) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Director { config, games: Mutex::new(HashMap::new()), cancel_tx, cancel_rx }
    }

    /// Derives a distinct but reproducible per-table seed from the base
    /// seed and `game_id`, so two game ids never shuffle identically while
    /// a given `--seed` still reproduces an entire run (FNV-1a; plain and
    /// portable, unlike relying on `HashMap`'s hasher for this).
    fn derive_seed(&self, game_id: &str) -> u64 {
        let mut hash: u64 = 0xcbf29ce484222325 ^ self.config.seed;
        for byte in game_id.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }

    /// Returns the mailbox for `game_id`, spawning a fresh table actor the
    /// first time it's seen.
    fn handle_for(&self, game_id: &str) -> mpsc::UnboundedSender<TableMsg> {
        let mut games = self.games.lock().unwrap();
        if let Some(handle) = games.get(game_id) {
            return handle.mailbox.clone();
        }

        let stats = Arc::new(GameStats::new());
        let mut monitors: Vec<Box<dyn HandMonitor>> = Vec::new();
        if let Some(path) = &self.config.hand_history_path {
            match JsonlHandHistoryMonitor::create(path) {
                Ok(monitor) => monitors.push(Box::new(monitor)),
                Err(err) => tracing::warn!(%err, path = %path.display(), "failed to open hand history file"),
            }
        }
        if monitors.is_empty() {
            monitors.push(Box::new(NullMonitor));
        }

        let mailbox = table_actor::spawn(
            game_id.to_string(),
            self.config.table.clone(),
            self.derive_seed(game_id),
            self.config.decision_timeout,
            self.config.hand_limit,
            monitors,
            stats.clone(),
            self.cancel_rx.clone(),
        );
        games.insert(game_id.to_string(), GameHandle { mailbox: mailbox.clone(), stats });
        mailbox
    }

    /// Sends the table an admission request without waiting for its
    /// decision. Callers that need to relay interim events (a `queued`
    /// notice while the table finishes its current hand) while still
    /// waiting should drive `reply` and `outbound` themselves instead of
    /// calling `join`.
    pub fn begin_join(
        &self,
        game_id: &str,
        name: String,
        buy_in: Option<u64>,
    ) -> Result<(oneshot::Receiver<Result<JoinAck, DirectorError>>, mpsc::Receiver<ServerEvent>, mpsc::Sender<ServerEvent>), DirectorError>
    {
        let mailbox = self.handle_for(game_id);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_HIGH_WATERMARK);
        let (reply_tx, reply_rx) = oneshot::channel();
        mailbox
            .send(TableMsg::Join { name, buy_in, outbound: outbound_tx.clone(), reply: reply_tx })
            .map_err(|_| DirectorError::Admission(AdmissionError::UnknownGame(game_id.to_string())))?;
        Ok((reply_rx, outbound_rx, outbound_tx))
    }

    /// Routes an `Auth` to its table, waiting for the table loop to either
    /// seat the participant or refuse it (name conflict, missing buy-in,
    /// table full). Any interim events sent before admission resolves
    /// (e.g. a `queued` notice) are buffered on `JoinedSession::outbound`
    /// rather than relayed live; use `begin_join` to relay them as they
    /// happen.
    pub async fn join(&self, game_id: &str, name: String, buy_in: Option<u64>) -> Result<JoinedSession, DirectorError> {
        let (reply_rx, outbound_rx, outbound_tx) = self.begin_join(game_id, name, buy_in)?;
        let ack: JoinAck = reply_rx
            .await
            .map_err(|_| DirectorError::Admission(AdmissionError::UnknownGame(game_id.to_string())))??;
        Ok(JoinedSession {
            table_id: ack.table_id,
            seat: ack.seat,
            stack: ack.stack,
            outbound: outbound_rx,
            outbound_tx,
        })
    }

    /// Forwards a seated participant's command to its table's mailbox.
    /// Silently drops it if the table has since shut down — the session's
    /// reader loop is about to observe the closed connection regardless.
    pub fn route_command(&self, game_id: &str, seat: usize, command: ClientCommand) {
        let mailbox = {
            let games = self.games.lock().unwrap();
            games.get(game_id).map(|h| h.mailbox.clone())
        };
        if let Some(mailbox) = mailbox {
            let _ = mailbox.send(TableMsg::Command { seat, command });
        }
    }

    pub fn stats(&self, game_id: &str) -> Result<StatsSnapshot, DirectorError> {
        let games = self.games.lock().unwrap();
        games
            .get(game_id)
            .map(|h| h.stats.snapshot())
            .ok_or_else(|| DirectorError::Admission(AdmissionError::UnknownGame(game_id.to_string())))
    }

    /// `true` once any table has completed at least `hand_limit` hands —
    /// used by the `spawn` binary to know when its run is done.
    pub fn any_game_completed(&self, hand_limit: u64) -> bool {
        let games = self.games.lock().unwrap();
        games.values().any(|h| h.stats.hands_completed() >= hand_limit)
    }

    /// Cascades a shutdown signal to every table. Each table loop unblocks
    /// its current wait immediately and winds down on its own, refunding
    /// any hand in flight since it never reaches `settle`.
    pub fn shutdown(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DirectorConfig {
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
            seed: 1,
            decision_timeout: Duration::from_millis(100),
            hand_limit: None,
            enable_stats: true,
            hand_history_path: None,
        }
    }

    #[test]
    fn seed_derivation_is_deterministic_and_game_specific() {
        let director = Director::new(config());
        assert_eq!(director.derive_seed("main"), director.derive_seed("main"));
        assert_ne!(director.derive_seed("main"), director.derive_seed("other"));
    }

    #[tokio::test]
    async fn join_on_unknown_game_still_admits_by_lazily_creating_it() {
        let director = Director::new(config());
        let joined = director.join("main", "alice".to_string(), Some(1000)).await.unwrap();
        assert_eq!(joined.seat, 0);
        assert_eq!(joined.stack, 1000);
    }

    #[tokio::test]
    async fn stats_for_unknown_game_is_an_error() {
        let director = Director::new(config());
        assert!(director.stats("nope").is_err());
    }
}
