//! Error taxonomy for match operations.

use thiserror::Error;

use crate::engine::models::MatchPhase;

/// Errors surfaced to the caller of a match command.
///
/// None of these are fatal once a match is running: a rejected join or an
/// invalid enemy choice only affects the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Board size or tile layout violates the board invariant.
    #[error("invalid board config: {0}")]
    InvalidBoardConfig(String),

    /// Join refused (bad name, unknown avatar, duplicate name, ...).
    #[error("invalid join: {0}")]
    InvalidJoin(String),

    /// Card definition document missing or malformed.
    #[error("failed to load card catalog: {0}")]
    CatalogLoad(String),

    /// Chosen enemy id is not a connected opponent.
    #[error("invalid choice: {0}")]
    InvalidChoice(String),

    #[error("session is not logged in as admin")]
    NotAuthorized,

    #[error("match is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: MatchPhase,
        actual: MatchPhase,
    },

    #[error("at least {0} players are required to start")]
    NotEnoughPlayers(usize),

    #[error("unknown player: {0}")]
    UnknownPlayer(String),
}

/// Reason an in-flight turn stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// The match was ended (by an operator or the win teardown).
    MatchClosed,
    /// The player whose input was awaited has been removed.
    PlayerGone,
}
