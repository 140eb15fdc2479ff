//! Server-side error taxonomy, layered on top of `engine`'s hand/table
//! errors. Each variant maps onto a wire-protocol `Error` code in
//! `protocol::ErrorCode`.

use thiserror::Error;

/// A single client message that could not be honored. Carries enough
/// detail for `Director`/`Session` to pick the right wire error code and
/// log line; never surfaced to the client directly (see
/// `protocol::ErrorCode`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("a player named {0:?} is already seated at this table")]
    NameConflict(String),
    #[error("a buy-in amount is required to join this table")]
    MissingBuyIn,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("table {0:?} is full")]
    TableFull(String),
    #[error("no table with id {0:?}")]
    UnknownGame(String),
}

#[derive(Error, Debug)]
pub enum DirectorError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("bind failed: {0}")]
    Bind(#[from] std::io::Error),
}
