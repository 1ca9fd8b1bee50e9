//! Collaborator contracts
//!
//! The engine never owns balances or permanent history. It talks to these
//! traits, which a deployment backs with its own database and tests back
//! with [`crate::storage::InMemoryStore`].

use crate::common::types::{Amount, GameHistoryRecord, TransactionKind, User};
use crate::errors::LedgerError;
use async_trait::async_trait;

/// Balance ledger and user directory
///
/// Each call is one atomic unit scoped to one user: the balance mutation and
/// its ledger entry either both happen or neither does.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Look up a user by id
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, LedgerError>;

    /// Decrement the balance and append a ledger entry of `kind`.
    /// Returns the balance after the debit.
    async fn debit(
        &self,
        user_id: &str,
        amount: Amount,
        kind: TransactionKind,
    ) -> Result<Amount, LedgerError>;

    /// Increment the balance and append a ledger entry of `kind`.
    /// Returns the balance after the credit.
    async fn credit(
        &self,
        user_id: &str,
        amount: Amount,
        kind: TransactionKind,
    ) -> Result<Amount, LedgerError>;
}

/// Append-only store of per-bet history records
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn record_game_history(&self, record: GameHistoryRecord) -> Result<(), LedgerError>;
}
