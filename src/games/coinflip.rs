//! Coin flip engine
//!
//! `BETTING → RESOLVING (3s) → BETTING`. A correct call pays twice the stake.

use super::engine::{
    accept_bet, open_new_round, reset_timed_room, tick_betting, EngineContext, GameEngine, RoomTable,
};
use super::events::OutboundEvent;
use super::room::{Room, RoomConfig, RoomSnapshot};
use super::settlement::{RoundSettlement, SettlementLine, SettlementReport};
use super::types::{BetConfirmation, BetRequest, GameType, Phase, RoundResult, Wager};
use crate::common::lock;
use crate::errors::GameError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Payout factor for a correct call
pub const COINFLIP_PAYOUT: i64 = 2;

pub struct CoinFlipEngine {
    ctx: EngineContext,
    rooms: RoomTable<Room>,
}

impl CoinFlipEngine {
    pub fn new(ctx: EngineContext, rooms: &BTreeMap<String, RoomConfig>) -> Self {
        info!("🪙 Coin flip initialized with {} rooms", rooms.len());
        Self {
            ctx,
            rooms: RoomTable::new(GameType::CoinFlip, rooms, |room| room),
        }
    }

    fn parse_side(request: &BetRequest) -> Result<Wager, GameError> {
        match request.bet_type.as_deref() {
            Some("HEADS") => Ok(Wager::Heads),
            Some("TAILS") => Ok(Wager::Tails),
            _ => Err(GameError::InvalidSelection(
                "Use HEADS or TAILS".to_string(),
            )),
        }
    }

    /// Close betting, flip and build the round's settlement
    fn resolve(&self, room: &mut Room) -> RoundSettlement {
        room.enter(Phase::Resolving, self.ctx.timing.coinflip_resolve_seconds);

        let side = self.ctx.outcomes.coin_flip();
        let result = RoundResult::Coin(side);
        room.history.push(result);
        self.ctx.broadcast(&room.address, OutboundEvent::RoundResult(result));
        self.ctx
            .broadcast(&room.address, OutboundEvent::HistoryUpdate(room.history.to_vec()));

        let winning = Wager::coin(side);
        let lines = room
            .bets
            .iter_mut()
            .filter(|bet| !bet.settled)
            .map(|bet| {
                bet.settled = true;
                if bet.wager == winning {
                    SettlementLine::win(
                        bet.user_id.clone(),
                        bet.amount,
                        bet.amount.times(COINFLIP_PAYOUT),
                    )
                } else {
                    SettlementLine::loss(bet.user_id.clone(), bet.amount)
                }
            })
            .collect::<Vec<_>>();

        info!(
            "🪙 {} round {} landed {} ({} bets)",
            room.address,
            room.round_id,
            side,
            lines.len()
        );

        RoundSettlement {
            room: room.address.clone(),
            round_id: room.round_id,
            result: side.to_string(),
            lines,
        }
    }
}

#[async_trait]
impl GameEngine for CoinFlipEngine {
    fn game_type(&self) -> GameType {
        GameType::CoinFlip
    }

    fn room_ids(&self) -> Vec<String> {
        self.rooms.ids()
    }

    fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.rooms.snapshot(room_id)
    }

    async fn place_bet(&self, room_id: &str, request: BetRequest) -> Result<BetConfirmation, GameError> {
        let slot = self.rooms.get(room_id)?;
        accept_bet(&self.ctx, slot.as_ref(), request, Self::parse_side).await
    }

    fn tick(&self, room_id: &str) -> Result<Option<RoundSettlement>, GameError> {
        let slot = self.rooms.get(room_id)?;
        let mut room = lock(slot);
        match room.phase {
            Phase::Betting => {
                if tick_betting(&self.ctx, &mut room) {
                    return Ok(Some(self.resolve(&mut room)));
                }
            }
            Phase::Resolving => {
                if room.count_down() == 0 {
                    open_new_round(&self.ctx, &mut room);
                }
            }
            other => warn!("{} in unexpected phase {}", room.address, other),
        }
        Ok(None)
    }

    async fn settle(&self, settlement: RoundSettlement) -> SettlementReport {
        self.ctx.settle(settlement).await
    }

    async fn reset_room(&self, room_id: &str) -> Result<SettlementReport, GameError> {
        let slot = self.rooms.get(room_id)?;
        Ok(reset_timed_room(&self.ctx, slot.as_ref()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{Amount, TransactionKind, User};
    use crate::common::BalanceStore;
    use crate::errors::LedgerError;
    use crate::games::settlement::BetLedger;
    use crate::games::testing::TestBench;
    use crate::games::types::CoinSide;
    use crate::storage::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn bet(user: &str, amount: f64, side: &str) -> BetRequest {
        BetRequest {
            user_id: user.to_string(),
            user_name: user.to_uppercase(),
            amount,
            bet_type: Some(side.to_string()),
            bet_value: None,
        }
    }

    fn engine(bench: &TestBench) -> CoinFlipEngine {
        CoinFlipEngine::new(bench.context(), &bench.config.rooms.coinflip)
    }

    fn run_betting(engine: &CoinFlipEngine) -> Option<RoundSettlement> {
        for _ in 0..15 {
            if let Some(settlement) = engine.tick("standard").unwrap() {
                return Some(settlement);
            }
        }
        None
    }

    #[tokio::test]
    async fn test_heads_win_pays_double() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.outcomes.push_coin(CoinSide::Heads);
        let engine = engine(&bench);

        let confirmation = engine.place_bet("standard", bet("alice", 10.0, "HEADS")).await.unwrap();
        assert_eq!(confirmation.new_balance, Amount::from_units(90));

        let settlement = run_betting(&engine).expect("round should resolve after 15 ticks");
        assert_eq!(engine.snapshot("standard").unwrap().phase, Phase::Resolving);
        let report = engine.settle(settlement).await;

        assert_eq!(report.paid_out, Amount::from_units(20));
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(110)));
        let history = bench.store.history_for("alice");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].payout, Amount::from_units(20));
        assert_eq!(history[0].result, "HEADS");
        assert_eq!(history[0].game_type, "COINFLIP");
    }

    #[tokio::test]
    async fn test_losing_call_records_zero_payout() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("bob", "Bob", Amount::from_units(100));
        bench.outcomes.push_coin(CoinSide::Tails);
        let engine = engine(&bench);

        engine.place_bet("standard", bet("bob", 10.0, "HEADS")).await.unwrap();
        let settlement = run_betting(&engine).unwrap();
        engine.settle(settlement).await;

        assert_eq!(bench.store.balance("bob"), Some(Amount::from_units(90)));
        assert_eq!(bench.store.history_for("bob")[0].payout, Amount::ZERO);
    }

    #[tokio::test]
    async fn test_validation_order_and_no_side_effects() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        let engine = engine(&bench);

        let mut request = bet("alice", f64::NAN, "HEADS");
        assert_eq!(
            engine.place_bet("standard", request.clone()).await,
            Err(GameError::InvalidAmount)
        );

        request.amount = 4.99;
        assert!(matches!(
            engine.place_bet("standard", request.clone()).await,
            Err(GameError::BelowMinimum { .. })
        ));

        request.amount = 10.0;
        request.user_id = "guest".to_string();
        assert_eq!(
            engine.place_bet("standard", request.clone()).await,
            Err(GameError::Unauthenticated)
        );

        request.user_id = "alice".to_string();
        request.bet_type = Some("EDGE".to_string());
        assert!(matches!(
            engine.place_bet("standard", request).await,
            Err(GameError::InvalidSelection(_))
        ));

        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(100)));
        assert!(bench.store.ledger_entries().is_empty());
        assert!(bench.store.history_records().is_empty());
        assert!(engine.snapshot("standard").unwrap().bets.is_empty());
    }

    #[tokio::test]
    async fn test_sub_cent_stake_below_minimum_is_rejected() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        let engine = engine(&bench);

        assert_eq!(
            engine.place_bet("standard", bet("alice", 4.995, "HEADS")).await,
            Err(GameError::InvalidAmount)
        );
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(100)));
        assert!(bench.store.ledger_entries().is_empty());

        let confirmation = engine.place_bet("standard", bet("alice", 5.0, "HEADS")).await.unwrap();
        assert_eq!(confirmation.amount, Amount::from_units(5));
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_ledger_failure() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(5));
        let engine = engine(&bench);

        let error = engine
            .place_bet("standard", bet("alice", 10.0, "TAILS"))
            .await
            .unwrap_err();
        assert!(error.is_ledger_failure());
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(5)));
    }

    #[tokio::test]
    async fn test_bets_rejected_while_resolving_then_new_round() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        let engine = engine(&bench);

        run_betting(&engine).unwrap();
        assert_eq!(
            engine.place_bet("standard", bet("alice", 10.0, "HEADS")).await,
            Err(GameError::BettingClosed)
        );

        for _ in 0..3 {
            assert!(engine.tick("standard").unwrap().is_none());
        }
        let snapshot = engine.snapshot("standard").unwrap();
        assert_eq!(snapshot.phase, Phase::Betting);
        assert_eq!(snapshot.time_left, 15);
        assert_eq!(snapshot.round_id, 2);
        assert!(bench.sink.names_for(&snapshot.room).contains(&"new_round_started"));
    }

    #[tokio::test]
    async fn test_broadcast_order() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.outcomes.push_coin(CoinSide::Heads);
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 10.0, "HEADS")).await.unwrap();
        run_betting(&engine).unwrap();

        let address = engine.snapshot("standard").unwrap().room;
        let names = bench.sink.names_for(&address);
        assert_eq!(&names[..2], &["new_bet", "new_activity"]);
        assert_eq!(names.iter().filter(|n| **n == "timer_update").count(), 15);
        assert_eq!(&names[names.len() - 2..], &["round_result", "history_update"]);
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let bench = TestBench::new().unwrap();
        let engine = engine(&bench);
        assert_eq!(
            engine.place_bet("nowhere", bet("alice", 10.0, "HEADS")).await,
            Err(GameError::RoomNotFound("coinflip-nowhere".to_string()))
        );
        assert!(engine.tick("nowhere").is_err());
    }

    #[tokio::test]
    async fn test_reset_refunds_open_bets() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 10.0, "HEADS")).await.unwrap();
        let report = engine.reset_room("standard").await.unwrap();

        assert_eq!(report.credited, 1);
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(100)));
        assert_eq!(bench.store.history_for("alice")[0].result, "VOID");
        assert_eq!(engine.snapshot("standard").unwrap().round_id, 2);
    }

    /// Debit that parks until the test lets it through
    struct GatedStore {
        inner: Arc<InMemoryStore>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl BalanceStore for GatedStore {
        async fn find_user(&self, user_id: &str) -> Result<Option<User>, LedgerError> {
            self.inner.find_user(user_id).await
        }

        async fn debit(
            &self,
            user_id: &str,
            amount: Amount,
            kind: TransactionKind,
        ) -> Result<Amount, LedgerError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.debit(user_id, amount, kind).await
        }

        async fn credit(
            &self,
            user_id: &str,
            amount: Amount,
            kind: TransactionKind,
        ) -> Result<Amount, LedgerError> {
            self.inner.credit(user_id, amount, kind).await
        }
    }

    #[tokio::test]
    async fn test_debit_landing_after_close_is_refunded() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        let gated = Arc::new(GatedStore {
            inner: bench.store.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let ctx = EngineContext::new(
            BetLedger::new(gated.clone(), bench.store.clone()),
            bench.sink.clone(),
            bench.outcomes.clone(),
            bench.metrics.clone(),
            bench.config.engine.clone(),
        );
        let engine = Arc::new(CoinFlipEngine::new(ctx, &bench.config.rooms.coinflip));

        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.place_bet("standard", bet("alice", 10.0, "HEADS")).await }
        });
        gated.entered.notified().await;
        run_betting(&engine).unwrap();
        gated.release.notify_one();

        assert_eq!(pending.await.unwrap(), Err(GameError::BettingClosed));
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(100)));
        let kinds: Vec<_> = bench
            .store
            .ledger_entries_for("alice")
            .into_iter()
            .map(|entry| entry.kind)
            .collect();
        assert_eq!(kinds, vec![TransactionKind::Bet, TransactionKind::Refund]);
        assert!(engine.snapshot("standard").unwrap().bets.is_empty());
    }

    /// Store that counts directory lookups
    struct CountingStore {
        inner: Arc<InMemoryStore>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl BalanceStore for CountingStore {
        async fn find_user(&self, user_id: &str) -> Result<Option<User>, LedgerError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_user(user_id).await
        }

        async fn debit(
            &self,
            user_id: &str,
            amount: Amount,
            kind: TransactionKind,
        ) -> Result<Amount, LedgerError> {
            self.inner.debit(user_id, amount, kind).await
        }

        async fn credit(
            &self,
            user_id: &str,
            amount: Amount,
            kind: TransactionKind,
        ) -> Result<Amount, LedgerError> {
            self.inner.credit(user_id, amount, kind).await
        }
    }

    #[tokio::test]
    async fn test_anonymous_name_needs_no_lookup() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        let counting = Arc::new(CountingStore {
            inner: bench.store.clone(),
            lookups: AtomicUsize::new(0),
        });
        let ctx = EngineContext::new(
            BetLedger::new(counting.clone(), bench.store.clone()),
            bench.sink.clone(),
            bench.outcomes.clone(),
            bench.metrics.clone(),
            bench.config.engine.clone(),
        );
        let engine = CoinFlipEngine::new(ctx, &bench.config.rooms.coinflip);

        let mut request = bet("alice", 10.0, "TAILS");
        request.user_name = "  ".to_string();
        engine.place_bet("standard", request).await.unwrap();

        assert_eq!(counting.lookups.load(Ordering::SeqCst), 0);
        let address = engine.snapshot("standard").unwrap().room;
        match &bench.sink.events_for(&address)[0] {
            OutboundEvent::NewBet(placed) => assert_eq!(placed.display_name(), "alice"),
            other => panic!("expected new_bet, got {:?}", other),
        }
    }
}
