//! Bet ledger and round settlement
//!
//! Every balance change is one call against the external store, scoped to a
//! single user and a single bet. Settlement runs each bet as its own future,
//! so a failing credit or history write never blocks or reverses the others.

use super::types::{GameType, RoomAddress};
use crate::common::{
    traits::{BalanceStore, HistoryRecorder},
    types::{Amount, GameHistoryRecord, TransactionKind},
};
use crate::errors::LedgerError;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, warn};

/// One bet's share of a finished round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementLine {
    pub user_id: String,
    pub stake: Amount,
    /// Amount recorded as the bet's payout
    pub payout: Amount,
    /// Credit to apply now. `None` when nothing is owed or it was already paid.
    pub credit: Option<TransactionKind>,
}

impl SettlementLine {
    pub fn loss(user_id: String, stake: Amount) -> Self {
        Self {
            user_id,
            stake,
            payout: Amount::ZERO,
            credit: None,
        }
    }

    pub fn win(user_id: String, stake: Amount, payout: Amount) -> Self {
        Self {
            user_id,
            stake,
            payout,
            credit: Some(TransactionKind::Win),
        }
    }

    /// Already credited at cash-out time; recorded only
    pub fn paid(user_id: String, stake: Amount, payout: Amount) -> Self {
        Self {
            user_id,
            stake,
            payout,
            credit: None,
        }
    }

    pub fn refund(user_id: String, stake: Amount) -> Self {
        Self {
            user_id,
            stake,
            payout: stake,
            credit: Some(TransactionKind::Refund),
        }
    }
}

/// Work handed from an engine to the ledger when a round ends
#[derive(Debug, Clone)]
pub struct RoundSettlement {
    pub room: RoomAddress,
    pub round_id: u64,
    /// Result descriptor written to every history record
    pub result: String,
    pub lines: Vec<SettlementLine>,
}

impl RoundSettlement {
    pub fn game_type(&self) -> GameType {
        self.room.game_type
    }
}

/// Outcome of a settlement pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementReport {
    pub bets: usize,
    pub credited: usize,
    pub paid_out: Amount,
    pub credit_failures: usize,
    pub history_failures: usize,
}

impl SettlementReport {
    pub fn failures(&self) -> usize {
        self.credit_failures + self.history_failures
    }
}

#[derive(Debug, Default)]
struct LineOutcome {
    credited: Option<Amount>,
    credit_failed: bool,
    history_failed: bool,
}

/// Mediates all balance-affecting operations for the engines
#[derive(Clone)]
pub struct BetLedger {
    balances: Arc<dyn BalanceStore>,
    history: Arc<dyn HistoryRecorder>,
}

impl BetLedger {
    pub fn new(balances: Arc<dyn BalanceStore>, history: Arc<dyn HistoryRecorder>) -> Self {
        Self { balances, history }
    }

    /// Take a stake. Fails without mutation on insufficient funds or unknown user.
    pub async fn debit(&self, user_id: &str, amount: Amount) -> Result<Amount, LedgerError> {
        self.balances.debit(user_id, amount, TransactionKind::Bet).await
    }

    pub async fn credit(
        &self,
        user_id: &str,
        amount: Amount,
        kind: TransactionKind,
    ) -> Result<Amount, LedgerError> {
        self.balances.credit(user_id, amount, kind).await
    }

    /// Append one history record. Failures are logged, never returned.
    pub async fn record_history(
        &self,
        user_id: &str,
        game_type: GameType,
        round_id: u64,
        bet: Amount,
        payout: Amount,
        result: &str,
    ) -> bool {
        let record = GameHistoryRecord {
            user_id: user_id.to_string(),
            game_type: game_type.record_name().to_string(),
            round_id,
            bet,
            payout,
            result: result.to_string(),
            created_at: Utc::now(),
        };
        match self.history.record_game_history(record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "History record for {} in {} round {} failed: {}",
                    user_id,
                    game_type.record_name(),
                    round_id,
                    e
                );
                false
            }
        }
    }

    /// Settle every line of a round concurrently, one isolated unit per bet
    pub async fn settle(&self, settlement: &RoundSettlement) -> SettlementReport {
        let outcomes = join_all(
            settlement
                .lines
                .iter()
                .map(|line| self.settle_line(settlement, line)),
        )
        .await;

        let mut report = SettlementReport {
            bets: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            if let Some(amount) = outcome.credited {
                report.credited += 1;
                report.paid_out = report.paid_out.checked_add(amount).unwrap_or(report.paid_out);
            }
            report.credit_failures += usize::from(outcome.credit_failed);
            report.history_failures += usize::from(outcome.history_failed);
        }
        report
    }

    async fn settle_line(&self, settlement: &RoundSettlement, line: &SettlementLine) -> LineOutcome {
        let mut outcome = LineOutcome::default();

        if let Some(kind) = line.credit {
            if line.payout.is_positive() {
                match self.credit(&line.user_id, line.payout, kind).await {
                    Ok(_) => outcome.credited = Some(line.payout),
                    Err(e) => {
                        error!(
                            "{} credit of {} to {} in {} round {} failed: {}",
                            kind, line.payout, line.user_id, settlement.room, settlement.round_id, e
                        );
                        outcome.credit_failed = true;
                    }
                }
            }
        }

        outcome.history_failed = !self
            .record_history(
                &line.user_id,
                settlement.game_type(),
                settlement.round_id,
                line.stake,
                line.payout,
                &settlement.result,
            )
            .await;

        outcome
    }
}
