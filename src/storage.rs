//! In-memory balance store
//!
//! Backs the collaborator traits for the standalone binary and the test
//! suite. Each account lives in its own `DashMap` entry, so a debit or credit
//! holds exactly one shard lock while it checks, mutates and appends its
//! ledger entry.

use crate::common::{
    lock,
    traits::{BalanceStore, HistoryRecorder},
    types::{Amount, GameHistoryRecord, LedgerEntry, TransactionKind, User},
};
use crate::errors::LedgerError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct Account {
    name: String,
    balance: Amount,
}

#[derive(Default)]
pub struct InMemoryStore {
    accounts: DashMap<String, Account>,
    ledger: Mutex<Vec<LedgerEntry>>,
    history: Mutex<Vec<GameHistoryRecord>>,
    /// Users whose balance operations fail with `Unavailable`
    unavailable: DashSet<String>,
    /// Users whose history writes fail
    history_failures: DashSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an account
    pub fn insert_user(&self, id: impl Into<String>, name: impl Into<String>, balance: Amount) {
        self.accounts.insert(
            id.into(),
            Account {
                name: name.into(),
                balance,
            },
        );
    }

    pub fn balance(&self, user_id: &str) -> Option<Amount> {
        self.accounts.get(user_id).map(|account| account.balance)
    }

    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        lock(&self.ledger).clone()
    }

    pub fn ledger_entries_for(&self, user_id: &str) -> Vec<LedgerEntry> {
        lock(&self.ledger)
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn history_records(&self) -> Vec<GameHistoryRecord> {
        lock(&self.history).clone()
    }

    pub fn history_for(&self, user_id: &str) -> Vec<GameHistoryRecord> {
        lock(&self.history)
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Simulate an outage for one user's balance operations
    pub fn set_unavailable(&self, user_id: &str, unavailable: bool) {
        if unavailable {
            self.unavailable.insert(user_id.to_string());
        } else {
            self.unavailable.remove(user_id);
        }
    }

    /// Simulate history write failures for one user
    pub fn fail_history_for(&self, user_id: &str) {
        self.history_failures.insert(user_id.to_string());
    }

    fn check_available(&self, user_id: &str) -> Result<(), LedgerError> {
        if self.unavailable.contains(user_id) {
            return Err(LedgerError::Unavailable(format!(
                "account {} is temporarily locked",
                user_id
            )));
        }
        Ok(())
    }

    fn append_entry(&self, user_id: &str, amount: Amount, kind: TransactionKind, balance_after: Amount) {
        lock(&self.ledger).push(LedgerEntry {
            user_id: user_id.to_string(),
            amount,
            kind,
            balance_after,
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl BalanceStore for InMemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, LedgerError> {
        self.check_available(user_id)?;
        Ok(self.accounts.get(user_id).map(|account| User {
            id: user_id.to_string(),
            name: account.name.clone(),
            balance: account.balance,
        }))
    }

    async fn debit(
        &self,
        user_id: &str,
        amount: Amount,
        kind: TransactionKind,
    ) -> Result<Amount, LedgerError> {
        self.check_available(user_id)?;
        let mut account = self
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::UserNotFound(user_id.to_string()))?;

        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        let balance_after = account
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds)?;
        account.balance = balance_after;
        self.append_entry(user_id, amount, kind, balance_after);

        debug!("Debited {} from {} ({}), balance {}", amount, user_id, kind, balance_after);
        Ok(balance_after)
    }

    async fn credit(
        &self,
        user_id: &str,
        amount: Amount,
        kind: TransactionKind,
    ) -> Result<Amount, LedgerError> {
        self.check_available(user_id)?;
        let mut account = self
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::UserNotFound(user_id.to_string()))?;

        let balance_after = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Unavailable("balance overflow".to_string()))?;
        account.balance = balance_after;
        self.append_entry(user_id, amount, kind, balance_after);

        debug!("Credited {} to {} ({}), balance {}", amount, user_id, kind, balance_after);
        Ok(balance_after)
    }
}

#[async_trait]
impl HistoryRecorder for InMemoryStore {
    async fn record_game_history(&self, record: GameHistoryRecord) -> Result<(), LedgerError> {
        if self.history_failures.contains(&record.user_id) {
            return Err(LedgerError::Unavailable(format!(
                "history table rejected record for {}",
                record.user_id
            )));
        }
        lock(&self.history).push(record);
        Ok(())
    }
}
