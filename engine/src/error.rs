use thiserror::Error;

/// Failure to parse a card's canonical two-character notation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CardParseError {
    #[error("card notation must be exactly two characters: {0:?}")]
    WrongLength(String),
    #[error("unrecognized rank in card notation: {0:?}")]
    BadRank(String),
    #[error("unrecognized suit in card notation: {0:?}")]
    BadSuit(String),
}

/// Errors the hand state machine can raise while applying an action or
/// advancing street. These are the engine's half of the illegal-action
/// and internal-invariant-failure taxonomy; the server layer maps them
/// onto wire-protocol error codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandError {
    #[error("seat {0} is not the seat to act")]
    NotYourTurn(usize),
    #[error("seat {0} has already folded or is not in the hand")]
    SeatNotActing(usize),
    #[error("action is not legal in the current context: {0}")]
    IllegalAction(String),
    #[error("amount {amount} is out of the legal range {min}..={max}")]
    AmountOutOfRange { amount: u64, min: u64, max: u64 },
    #[error("the hand has already reached {0:?}")]
    HandAlreadyComplete(crate::hand::Street),
    #[error("not enough cards left in the deck to continue the hand")]
    DeckExhausted,
}

/// Errors from table-level operations (seating, starting a hand).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("table is full")]
    TableFull,
    #[error("seat {0} is already occupied")]
    SeatOccupied(usize),
    #[error("seat {0} is empty")]
    SeatEmpty(usize),
    #[error("not enough solvent seated players to start a hand (have {have}, need {need})")]
    NotEnoughPlayers { have: usize, need: usize },
    #[error("a hand is already in progress")]
    HandInProgress,
}
