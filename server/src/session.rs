//! Session: one connected participant's identity, outbound queue,
//! action-request correlation, and disconnection lifecycle.
//!
//! A `SessionHandle` here is the handle the table actor holds for a
//! seated participant — the reader/writer tasks that actually move bytes
//! over the socket live in `http`. The reader task forwards every decoded
//! command straight into the owning table's single mailbox
//! (`table_actor::TableMsg`) rather than into a queue owned by this
//! handle, so the table loop never has to select across one receiver per
//! seat. The table loop is the only thing that ever calls `send` on a
//! seated session's handle.

use tokio::sync::mpsc;

use crate::protocol::ServerEvent;

/// Bound on a session's outbound queue. Crossing it marks the session
/// unhealthy; the table stops awaiting its responses.
pub const OUTBOUND_HIGH_WATERMARK: usize = 1024;
/// A session marked unhealthy resumes normal flow once its queue drains
/// back under this low-water mark.
pub const OUTBOUND_LOW_WATERMARK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    /// Backpressured or silently disconnected; the table auto-folds this
    /// seat and stops waiting on its `ActionResponse`s.
    DisconnectedGrace,
    /// Removed from play; will not be dealt into the next hand.
    Ejected,
}

/// A seated participant as the table actor sees it.
pub struct SessionHandle {
    pub session_id: String,
    pub player_name: String,
    outbound: mpsc::Sender<ServerEvent>,
    next_request_id: u64,
    /// The request id the session currently owes a response for, if any.
    /// A session never has more than one outstanding `ActionRequest`.
    pub pending_request_id: Option<u64>,
    pub state: ConnectionState,
    pub consecutive_timeouts: u32,
}

impl SessionHandle {
    pub fn new(
        session_id: impl Into<String>,
        player_name: impl Into<String>,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            player_name: player_name.into(),
            outbound,
            next_request_id: 0,
            pending_request_id: None,
            state: ConnectionState::Connected,
            consecutive_timeouts: 0,
        }
    }

    /// Enqueues an event for the writer task. Never blocks: a full queue
    /// marks the session `DisconnectedGrace` instead of backing up the
    /// whole table loop.
    pub fn send(&mut self, event: ServerEvent) {
        match self.outbound.try_send(event) {
            Ok(()) => self.recover_if_drained(),
            Err(mpsc::error::TrySendError::Full(_)) => {
                if self.state == ConnectionState::Connected {
                    self.state = ConnectionState::DisconnectedGrace;
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.state = ConnectionState::Ejected;
            }
        }
    }

    fn recover_if_drained(&mut self) {
        if self.state == ConnectionState::DisconnectedGrace
            && self.outbound.capacity() >= OUTBOUND_HIGH_WATERMARK - OUTBOUND_LOW_WATERMARK
        {
            self.state = ConnectionState::Connected;
        }
    }

    /// Allocates the next correlation id for an `ActionRequest` to this
    /// session, replacing any previously pending id (which is now stale).
    pub fn new_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.pending_request_id = Some(self.next_request_id);
        self.next_request_id
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.state, ConnectionState::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_with_capacity(capacity: usize) -> (SessionHandle, mpsc::Receiver<ServerEvent>) {
        let (out_tx, out_rx) = mpsc::channel(capacity);
        (SessionHandle::new("s1", "alice", out_tx), out_rx)
    }

    #[test]
    fn request_ids_increase_monotonically() {
        let (mut session, _rx) = handle_with_capacity(8);
        assert_eq!(session.new_request_id(), 1);
        assert_eq!(session.new_request_id(), 2);
        assert_eq!(session.pending_request_id, Some(2));
    }

    #[test]
    fn full_outbound_queue_marks_session_disconnected_grace() {
        let (mut session, _rx) = handle_with_capacity(1);
        session.send(ServerEvent::welcome("s1"));
        session.send(ServerEvent::welcome("s1")); // queue now full, try_send fails
        assert_eq!(session.state, ConnectionState::DisconnectedGrace);
    }

    #[test]
    fn dropping_the_receiver_marks_session_ejected() {
        let (mut session, rx) = handle_with_capacity(4);
        drop(rx);
        session.send(ServerEvent::welcome("s1"));
        assert_eq!(session.state, ConnectionState::Ejected);
    }
}
