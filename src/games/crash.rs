//! Crash engine
//!
//! `BETTING (15s) → RUNNING → CRASHED (3s) → BETTING`.
//!
//! While RUNNING a sub-tick task owned by the room raises the multiplier along
//! `e^(0.06·t)` until it reaches the pre-drawn crash point. Players cash out at
//! the current multiplier at any time before that. Each sub-tick carries the
//! round id it was launched for and stops as soon as that round is gone.

use super::engine::{
    accept_bet, open_new_round, tick_betting, void_settlement, EngineContext, GameEngine, RoomTable,
};
use super::events::OutboundEvent;
use super::outcome::flight_multiplier;
use super::room::{HasRoom, Room, RoomConfig, RoomSnapshot};
use super::settlement::{RoundSettlement, SettlementLine, SettlementReport};
use super::types::{
    BetConfirmation, BetRequest, CashOutReceipt, GameType, Phase, RoundResult, Wager,
};
use crate::common::{
    lock,
    types::{Amount, Multiplier, TransactionKind},
};
use crate::errors::{GameError, LedgerError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Crash room: shared round state plus the flight
#[derive(Debug)]
pub struct CrashRoom {
    room: Room,
    multiplier: Multiplier,
    crash_point: Multiplier,
    /// Set once the current round has launched
    round_started: bool,
    flight: Option<JoinHandle<()>>,
}

impl CrashRoom {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            multiplier: Multiplier::ONE,
            crash_point: Multiplier::ONE,
            round_started: false,
            flight: None,
        }
    }

    pub fn multiplier(&self) -> Multiplier {
        self.multiplier
    }

    fn abort_flight(&mut self) {
        if let Some(handle) = self.flight.take() {
            handle.abort();
        }
    }

    fn clear_flight(&mut self) {
        self.abort_flight();
        self.multiplier = Multiplier::ONE;
        self.crash_point = Multiplier::ONE;
        self.round_started = false;
    }
}

impl HasRoom for CrashRoom {
    fn room(&self) -> &Room {
        &self.room
    }

    fn room_mut(&mut self) -> &mut Room {
        &mut self.room
    }

    /// Includes the live multiplier; the crash point stays hidden
    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            multiplier: Some(self.multiplier),
            ..self.room.snapshot()
        }
    }
}

/// What one sub-tick did
#[derive(Debug)]
pub enum FlightStep {
    /// Still climbing
    Continue,
    /// The round this sub-tick belongs to is over; nothing was touched
    Stop,
    /// Just crashed; the round's settlement is ready to run
    Crashed(RoundSettlement),
}

pub struct CrashEngine {
    ctx: EngineContext,
    rooms: RoomTable<CrashRoom>,
}

impl CrashEngine {
    pub fn new(ctx: EngineContext, rooms: &BTreeMap<String, RoomConfig>) -> Self {
        info!("🚀 Crash initialized with {} rooms", rooms.len());
        Self {
            ctx,
            rooms: RoomTable::new(GameType::Crash, rooms, CrashRoom::new),
        }
    }

    /// Advance a room's flight to `elapsed` since launch.
    ///
    /// The sub-tick task calls this every period; it is public so the flight
    /// can be driven by hand.
    pub fn advance_multiplier(
        &self,
        room_id: &str,
        round_id: u64,
        elapsed: Duration,
    ) -> Result<FlightStep, GameError> {
        let slot = self.rooms.get(room_id)?;
        Ok(advance_flight(&self.ctx, slot, round_id, elapsed))
    }

    /// Close betting and launch the round. False if this round already launched.
    fn launch(&self, slot: &Arc<Mutex<CrashRoom>>, state: &mut CrashRoom) -> bool {
        if state.round_started {
            warn!(
                "{} round {} already launched",
                state.room.address, state.room.round_id
            );
            return false;
        }
        state.round_started = true;
        state.crash_point = self.ctx.outcomes.crash_point();
        state.multiplier = Multiplier::ONE;
        state.room.enter(Phase::Running, 0);

        self.ctx.broadcast(
            &state.room.address,
            OutboundEvent::GameStarted {
                crash_point: state.crash_point,
            },
        );
        state.flight = spawn_flight(self.ctx.clone(), slot.clone(), state.room.round_id);

        info!(
            "🚀 {} round {} launched with {} bets",
            state.room.address,
            state.room.round_id,
            state.room.bets.len()
        );
        true
    }

    /// Undo a cash-out whose credit failed so the bet rides on. Once the
    /// round has settled the bet as paid the failure can only be reported.
    fn revert_cash_out(
        &self,
        slot: &Mutex<CrashRoom>,
        round_id: u64,
        index: usize,
        user_id: &str,
        payout: Amount,
        cause: &LedgerError,
    ) {
        let mut guard = lock(slot);
        let state = &mut *guard;
        let open = state.room.round_id == round_id;
        match state.room.bets.get_mut(index) {
            Some(bet) if open && !bet.settled && bet.user_id == user_id => {
                bet.cashed_out = false;
                bet.cashout_multiplier = None;
                warn!(
                    "Cash-out credit of {} to {} in {} failed, bet rides on: {}",
                    payout, user_id, state.room.address, cause
                );
            }
            _ => {
                self.ctx.metrics.settlement_failed(GameType::Crash);
                error!(
                    "Cash-out credit of {} to {} in {} round {} failed after settlement: {}",
                    payout, user_id, state.room.address, round_id, cause
                );
            }
        }
    }
}

/// Start the sub-tick for `round_id`. The first tick fires one period after launch.
fn spawn_flight(
    ctx: EngineContext,
    slot: Arc<Mutex<CrashRoom>>,
    round_id: u64,
) -> Option<JoinHandle<()>> {
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Cannot start crash flight outside a runtime: {}", e);
            return None;
        }
    };
    let period = ctx.timing.crash_sub_tick();

    Some(runtime.spawn(async move {
        let launched = Instant::now();
        let mut ticker = interval_at(launched + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match advance_flight(&ctx, &slot, round_id, launched.elapsed()) {
                FlightStep::Continue => {}
                FlightStep::Stop => break,
                FlightStep::Crashed(settlement) => {
                    ctx.settle(settlement).await;
                    break;
                }
            }
        }
    }))
}

fn advance_flight(
    ctx: &EngineContext,
    slot: &Mutex<CrashRoom>,
    round_id: u64,
    elapsed: Duration,
) -> FlightStep {
    let mut guard = lock(slot);
    let state = &mut *guard;
    if state.room.round_id != round_id || state.room.phase != Phase::Running {
        return FlightStep::Stop;
    }

    let reached = flight_multiplier(elapsed.as_secs_f64(), ctx.timing.crash_growth_rate);
    state.multiplier = state.multiplier.max(reached);
    if state.multiplier >= state.crash_point {
        return FlightStep::Crashed(crash(ctx, state));
    }

    ctx.broadcast(
        &state.room.address,
        OutboundEvent::MultiplierUpdate {
            multiplier: state.multiplier,
        },
    );
    FlightStep::Continue
}

fn crash(ctx: &EngineContext, state: &mut CrashRoom) -> RoundSettlement {
    // Called from the flight itself: detach rather than abort so the
    // caller can still run the settlement.
    state.flight.take();

    let point = state.crash_point;
    state.multiplier = point;
    state.room.enter(Phase::Crashed, ctx.timing.crash_cooldown_seconds);
    state.room.history.push(RoundResult::Crash(point));

    let address = state.room.address.clone();
    ctx.broadcast(&address, OutboundEvent::GameCrashed { multiplier: point });
    ctx.broadcast(&address, OutboundEvent::HistoryUpdate(state.room.history.to_vec()));

    let lines = state
        .room
        .bets
        .iter_mut()
        .filter(|bet| !bet.settled)
        .map(|bet| {
            bet.settled = true;
            match bet.cashout_multiplier {
                Some(multiplier) if bet.cashed_out => SettlementLine::paid(
                    bet.user_id.clone(),
                    bet.amount,
                    bet.amount.scaled_by(multiplier),
                ),
                _ => SettlementLine::loss(bet.user_id.clone(), bet.amount),
            }
        })
        .collect::<Vec<_>>();

    info!(
        "💥 {} round {} crashed at {}x ({} bets)",
        address,
        state.room.round_id,
        point,
        lines.len()
    );

    RoundSettlement {
        room: address,
        round_id: state.room.round_id,
        result: point.to_string(),
        lines,
    }
}

#[async_trait]
impl GameEngine for CrashEngine {
    fn game_type(&self) -> GameType {
        GameType::Crash
    }

    fn room_ids(&self) -> Vec<String> {
        self.rooms.ids()
    }

    fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.rooms.snapshot(room_id)
    }

    async fn place_bet(&self, room_id: &str, request: BetRequest) -> Result<BetConfirmation, GameError> {
        let slot = self.rooms.get(room_id)?;
        accept_bet(&self.ctx, slot.as_ref(), request, |_| Ok(Wager::Ride)).await
    }

    async fn cash_out(&self, room_id: &str, user_id: &str) -> Result<CashOutReceipt, GameError> {
        let slot = self.rooms.get(room_id)?;

        // Test-and-set under the lock: a second request for the same bet
        // finds it already cashed out.
        let (address, round_id, index, multiplier, stake, user_name) = {
            let mut guard = lock(slot);
            let state = &mut *guard;
            if state.room.phase != Phase::Running {
                return Err(GameError::TooLate);
            }
            let multiplier = state.multiplier;
            let index = state
                .room
                .bets
                .iter()
                .position(|bet| bet.user_id == user_id && !bet.cashed_out)
                .ok_or(GameError::NoActiveBet)?;
            let bet = &mut state.room.bets[index];
            bet.cashed_out = true;
            bet.cashout_multiplier = Some(multiplier);
            (
                state.room.address.clone(),
                state.room.round_id,
                index,
                multiplier,
                bet.amount,
                bet.display_name().to_string(),
            )
        };

        let payout = stake.scaled_by(multiplier);
        let new_balance = match self
            .ctx
            .ledger
            .credit(user_id, payout, TransactionKind::Cashout)
            .await
        {
            Ok(balance) => balance,
            Err(e) => {
                self.revert_cash_out(slot, round_id, index, user_id, payout, &e);
                return Err(GameError::Ledger(e));
            }
        };

        {
            let _room = lock(slot);
            self.ctx.broadcast(
                &address,
                OutboundEvent::CrashPlayerWon {
                    user_name,
                    multiplier,
                },
            );
        }
        self.ctx.metrics.cashout(GameType::Crash);
        debug!("{} cashed out {} at {}x in {}", user_id, payout, multiplier, address);

        Ok(CashOutReceipt {
            multiplier,
            payout,
            new_balance,
        })
    }

    fn tick(&self, room_id: &str) -> Result<Option<RoundSettlement>, GameError> {
        let slot = self.rooms.get(room_id)?;
        let mut guard = lock(slot);
        let state = &mut *guard;
        match state.room.phase {
            Phase::Betting => {
                if tick_betting(&self.ctx, &mut state.room) {
                    self.launch(slot, state);
                }
            }
            // The flight drives this phase
            Phase::Running => {}
            Phase::Crashed => {
                if state.room.count_down() == 0 {
                    state.clear_flight();
                    open_new_round(&self.ctx, &mut state.room);
                }
            }
            other => warn!("{} in unexpected phase {}", state.room.address, other),
        }
        Ok(None)
    }

    async fn settle(&self, settlement: RoundSettlement) -> SettlementReport {
        self.ctx.settle(settlement).await
    }

    async fn reset_room(&self, room_id: &str) -> Result<SettlementReport, GameError> {
        let slot = self.rooms.get(room_id)?;
        let settlement = {
            let mut guard = lock(slot);
            let state = &mut *guard;
            let (phase, round_id) = (state.room.phase, state.room.round_id);
            state.clear_flight();
            let dropped = open_new_round(&self.ctx, &mut state.room);
            info!("🔄 {} reset during {} of round {}", state.room.address, phase, round_id);
            void_settlement(&state.room.address, round_id, dropped)
        };
        Ok(self.ctx.settle(settlement).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::testing::TestBench;

    fn bet(user: &str, amount: f64) -> BetRequest {
        BetRequest {
            user_id: user.to_string(),
            user_name: String::new(),
            amount,
            bet_type: None,
            bet_value: None,
        }
    }

    fn engine(bench: &TestBench) -> CrashEngine {
        CrashEngine::new(bench.context(), &bench.config.rooms.crash)
    }

    /// Elapsed flight time at which the curve reaches `target`
    fn time_to(target: f64) -> Duration {
        Duration::from_secs_f64(target.ln() / 0.06)
    }

    fn launch(engine: &CrashEngine) {
        for _ in 0..15 {
            engine.tick("standard").unwrap();
        }
        assert_eq!(engine.snapshot("standard").unwrap().phase, Phase::Running);
    }

    fn crash_now(engine: &CrashEngine, round_id: u64) -> RoundSettlement {
        match engine
            .advance_multiplier("standard", round_id, Duration::from_secs(600))
            .unwrap()
        {
            FlightStep::Crashed(settlement) => settlement,
            other => panic!("expected crash, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cash_out_at_current_multiplier() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(300));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 5.0)).await.unwrap();
        launch(&engine);
        assert!(matches!(
            engine.advance_multiplier("standard", 1, time_to(2.5)).unwrap(),
            FlightStep::Continue
        ));

        let receipt = engine.cash_out("standard", "alice").await.unwrap();
        assert_eq!(receipt.multiplier, Multiplier::from_hundredths(250));
        assert_eq!(receipt.payout, Amount::from_cents(1250));
        assert_eq!(receipt.new_balance, Amount::from_cents(10750));

        assert_eq!(
            engine.cash_out("standard", "alice").await,
            Err(GameError::NoActiveBet)
        );
        assert_eq!(bench.sink.count("crash_player_won"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_cash_outs_pay_once() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(500));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 10.0)).await.unwrap();
        launch(&engine);
        engine.advance_multiplier("standard", 1, time_to(2.0)).unwrap();

        let (first, second) = tokio::join!(
            engine.cash_out("standard", "alice"),
            engine.cash_out("standard", "alice")
        );
        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(110)));
        let cashouts = bench
            .store
            .ledger_entries_for("alice")
            .into_iter()
            .filter(|entry| entry.kind == TransactionKind::Cashout)
            .count();
        assert_eq!(cashouts, 1);
    }

    #[tokio::test]
    async fn test_cash_out_outside_flight_is_too_late() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 5.0)).await.unwrap();
        assert_eq!(engine.cash_out("standard", "alice").await, Err(GameError::TooLate));

        launch(&engine);
        crash_now(&engine, 1);
        assert_eq!(engine.cash_out("standard", "alice").await, Err(GameError::TooLate));
        assert_eq!(engine.cash_out("standard", "bob").await, Err(GameError::TooLate));
    }

    #[tokio::test]
    async fn test_crash_settles_without_recrediting_cash_outs() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.store.insert_user("bob", "Bob", Amount::from_units(100));
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(300));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 5.0)).await.unwrap();
        engine.place_bet("standard", bet("bob", 5.0)).await.unwrap();
        launch(&engine);
        engine.advance_multiplier("standard", 1, time_to(2.5)).unwrap();
        engine.cash_out("standard", "alice").await.unwrap();

        let settlement = crash_now(&engine, 1);
        assert_eq!(settlement.result, "3.00");
        let snapshot = engine.snapshot("standard").unwrap();
        assert_eq!(snapshot.phase, Phase::Crashed);
        assert_eq!(snapshot.multiplier, Some(Multiplier::from_hundredths(300)));
        assert_eq!(snapshot.history, vec![RoundResult::Crash(Multiplier::from_hundredths(300))]);

        let report = engine.settle(settlement).await;
        assert_eq!(report.bets, 2);
        assert_eq!(report.credited, 0);
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_cents(10750)));
        assert_eq!(bench.store.balance("bob"), Some(Amount::from_units(95)));
        assert_eq!(bench.store.history_for("alice")[0].payout, Amount::from_cents(1250));
        assert_eq!(bench.store.history_for("bob")[0].payout, Amount::ZERO);
        assert_eq!(bench.store.history_for("bob")[0].game_type, "CRASHGAME");

        let address = snapshot.room;
        let names = bench.sink.names_for(&address);
        assert_eq!(&names[names.len() - 2..], &["game_crashed", "history_update"]);
    }

    #[tokio::test]
    async fn test_launch_is_guarded() {
        let bench = TestBench::new().unwrap();
        let engine = engine(&bench);

        let slot = engine.rooms.get("standard").unwrap().clone();
        let mut state = lock(&slot);
        assert!(engine.launch(&slot, &mut state));
        assert!(!engine.launch(&slot, &mut state));
        assert_eq!(bench.sink.count("game_started"), 1);
    }

    #[tokio::test]
    async fn test_stale_round_stops_without_touching_state() {
        let bench = TestBench::new().unwrap();
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(500));
        let engine = engine(&bench);
        launch(&engine);

        assert!(matches!(
            engine.advance_multiplier("standard", 99, time_to(4.0)).unwrap(),
            FlightStep::Stop
        ));
        assert_eq!(
            engine.snapshot("standard").unwrap().multiplier,
            Some(Multiplier::ONE)
        );
    }

    #[tokio::test]
    async fn test_multiplier_never_decreases() {
        let bench = TestBench::new().unwrap();
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(500));
        let engine = engine(&bench);
        launch(&engine);

        engine.advance_multiplier("standard", 1, time_to(2.0)).unwrap();
        engine.advance_multiplier("standard", 1, time_to(1.5)).unwrap();
        assert_eq!(
            engine.snapshot("standard").unwrap().multiplier,
            Some(Multiplier::from_hundredths(200))
        );
    }

    #[tokio::test]
    async fn test_cooldown_opens_next_round() {
        let bench = TestBench::new().unwrap();
        let engine = engine(&bench);
        launch(&engine);
        crash_now(&engine, 1);

        for _ in 0..3 {
            assert!(engine.tick("standard").unwrap().is_none());
        }
        let snapshot = engine.snapshot("standard").unwrap();
        assert_eq!(snapshot.phase, Phase::Betting);
        assert_eq!(snapshot.round_id, 2);
        assert_eq!(snapshot.time_left, 15);
        assert_eq!(snapshot.multiplier, Some(Multiplier::ONE));

        // The old flight's round is gone
        assert!(matches!(
            engine.advance_multiplier("standard", 1, time_to(1.5)).unwrap(),
            FlightStep::Stop
        ));
    }

    #[tokio::test]
    async fn test_reset_mid_flight() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.store.insert_user("bob", "Bob", Amount::from_units(100));
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(500));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 10.0)).await.unwrap();
        engine.place_bet("standard", bet("bob", 10.0)).await.unwrap();
        launch(&engine);
        engine.advance_multiplier("standard", 1, time_to(2.0)).unwrap();
        engine.cash_out("standard", "alice").await.unwrap();

        let report = engine.reset_room("standard").await.unwrap();
        assert_eq!(report.bets, 2);
        assert_eq!(report.credited, 1);
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(110)));
        assert_eq!(bench.store.balance("bob"), Some(Amount::from_units(100)));
        assert_eq!(bench.store.history_for("bob")[0].result, "VOID");

        let snapshot = engine.snapshot("standard").unwrap();
        assert_eq!(snapshot.phase, Phase::Betting);
        assert_eq!(snapshot.round_id, 2);
        assert_eq!(snapshot.multiplier, Some(Multiplier::ONE));
    }

    #[tokio::test]
    async fn test_failed_cash_out_credit_leaves_bet_riding() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(500));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 10.0)).await.unwrap();
        launch(&engine);
        engine.advance_multiplier("standard", 1, time_to(2.0)).unwrap();

        bench.store.set_unavailable("alice", true);
        assert!(matches!(
            engine.cash_out("standard", "alice").await,
            Err(GameError::Ledger(LedgerError::Unavailable(_)))
        ));
        let snapshot = engine.snapshot("standard").unwrap();
        assert!(!snapshot.bets[0].cashed_out);
        assert_eq!(snapshot.bets[0].cashout_multiplier, None);
        assert_eq!(bench.sink.count("crash_player_won"), 0);

        bench.store.set_unavailable("alice", false);
        let receipt = engine.cash_out("standard", "alice").await.unwrap();
        assert_eq!(receipt.payout, Amount::from_units(20));
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(110)));

        let report = engine.settle(crash_now(&engine, 1)).await;
        assert_eq!(report.credited, 0);
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(110)));
        assert_eq!(bench.store.history_for("alice")[0].payout, Amount::from_units(20));
    }

    #[tokio::test]
    async fn test_failed_cash_out_credit_loses_at_crash() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(500));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("alice", 10.0)).await.unwrap();
        launch(&engine);
        engine.advance_multiplier("standard", 1, time_to(2.0)).unwrap();

        bench.store.set_unavailable("alice", true);
        assert!(engine.cash_out("standard", "alice").await.is_err());
        bench.store.set_unavailable("alice", false);

        engine.settle(crash_now(&engine, 1)).await;
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(90)));
        let credits = bench
            .store
            .ledger_entries_for("alice")
            .into_iter()
            .filter(|entry| entry.kind != TransactionKind::Bet)
            .count();
        assert_eq!(credits, 0);
        assert_eq!(bench.store.history_for("alice")[0].payout, Amount::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_flight_crashes_and_settles() {
        let mut bench = TestBench::new().unwrap();
        bench.config.engine.crash_sub_tick_ms = 50;
        bench.store.insert_user("bob", "Bob", Amount::from_units(100));
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(150));
        let engine = engine(&bench);

        engine.place_bet("standard", bet("bob", 10.0)).await.unwrap();
        launch(&engine);

        // e^(0.06t) reaches 1.50 after about 6.8s
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = engine.snapshot("standard").unwrap();
        assert_eq!(snapshot.phase, Phase::Crashed);
        assert_eq!(snapshot.multiplier, Some(Multiplier::from_hundredths(150)));
        assert!(bench.sink.count("multiplier_update") > 0);
        assert_eq!(bench.sink.count("game_crashed"), 1);

        let history = bench.store.history_for("bob");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].payout, Amount::ZERO);
        assert_eq!(history[0].result, "1.50");
        assert_eq!(bench.metrics.rounds_settled_for(GameType::Crash), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_live_flight() {
        let mut bench = TestBench::new().unwrap();
        bench.config.engine.crash_sub_tick_ms = 50;
        bench.outcomes.push_crash_point(Multiplier::from_hundredths(100_000));
        let engine = engine(&bench);
        launch(&engine);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(bench.sink.count("multiplier_update") > 0);

        engine.reset_room("standard").await.unwrap();
        bench.sink.clear();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(bench.sink.count("multiplier_update"), 0);
        assert_eq!(bench.sink.count("game_crashed"), 0);
        let snapshot = engine.snapshot("standard").unwrap();
        assert_eq!(snapshot.phase, Phase::Betting);
        assert_eq!(snapshot.round_id, 2);
        assert_eq!(snapshot.multiplier, Some(Multiplier::ONE));
    }
}
