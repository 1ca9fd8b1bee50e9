//! Error types for the betting engine
//!
//! Every layer gets its own enum; `CasinoError` is the root used at the
//! binary and server boundary.

use crate::common::types::Amount;

/// Root error type for process-level operations
#[derive(Debug, thiserror::Error)]
pub enum CasinoError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Failures reported by the external balance store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("User {0} does not exist")]
    UserNotFound(String),

    #[error("Balance store unavailable: {0}")]
    Unavailable(String),
}

/// Rejections produced while handling a player action
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room {0} does not exist")]
    RoomNotFound(String),

    #[error("Betting phase is closed")]
    BettingClosed,

    #[error("Invalid bet amount")]
    InvalidAmount,

    #[error("Amount below table minimum of {min}")]
    BelowMinimum { min: Amount },

    #[error("You must be logged in to play")]
    Unauthenticated,

    #[error("Invalid bet type: {0}")]
    InvalidSelection(String),

    #[error("NUMBER bets require a target between 0 and 36")]
    MissingTarget,

    #[error("Too late! The rocket already crashed.")]
    TooLate,

    #[error("You have no active bet")]
    NoActiveBet,

    #[error("{0} does not support this action")]
    Unsupported(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl GameError {
    /// Balance-store failures travel on `bet_error`; everything else is a
    /// rejection decided before the store was touched.
    pub fn is_ledger_failure(&self) -> bool {
        matches!(self, GameError::Ledger(_))
    }
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write configuration file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Transport and startup errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Convenience type alias for Results
pub type CasinoResult<T> = Result<T, CasinoError>;
