//! Round scheduler
//!
//! A single periodic loop drives every room of every engine. Each room is
//! ticked in isolation: an error or panic in one room is logged and the loop
//! moves on. Settlement produced by a tick runs on its own task so the next
//! tick is never held up by the balance store.

use crate::games::GameEngine;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub struct RoundScheduler {
    engines: Vec<Arc<dyn GameEngine>>,
    period: Duration,
}

impl RoundScheduler {
    pub fn new(engines: Vec<Arc<dyn GameEngine>>, period: Duration) -> Self {
        Self { engines, period }
    }

    /// Start the loop on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let rooms: usize = self.engines.iter().map(|e| e.room_ids().len()).sum();
        info!(
            "⏱️  Round scheduler started: {} engines, {} rooms, every {:?}",
            self.engines.len(),
            rooms,
            self.period
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; rooms start with a full timer.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.tick_all();
        }
    }

    /// Tick every room once. Returns the settlements handed off.
    pub fn tick_all(&self) -> usize {
        let mut settlements = 0;
        for engine in &self.engines {
            for room_id in engine.room_ids() {
                match catch_unwind(AssertUnwindSafe(|| engine.tick(&room_id))) {
                    Ok(Ok(Some(settlement))) => {
                        debug!("Spawning settlement for {}", settlement.room);
                        let engine = Arc::clone(engine);
                        tokio::spawn(async move {
                            engine.settle(settlement).await;
                        });
                        settlements += 1;
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        warn!("Tick for {}-{} failed: {}", engine.game_type(), room_id, e);
                    }
                    Err(_) => {
                        error!("💥 Tick for {}-{} panicked", engine.game_type(), room_id);
                    }
                }
            }
        }
        settlements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Amount;
    use crate::errors::GameError;
    use crate::games::{
        BetConfirmation, BetRequest, CoinFlipEngine, CoinSide, GameType, Phase, RoomSnapshot,
        RoundSettlement, SettlementReport,
    };
    use crate::games::testing::TestBench;
    use async_trait::async_trait;

    struct PanickingEngine;

    #[async_trait]
    impl GameEngine for PanickingEngine {
        fn game_type(&self) -> GameType {
            GameType::Roulette
        }

        fn room_ids(&self) -> Vec<String> {
            vec!["broken".to_string()]
        }

        fn snapshot(&self, _room_id: &str) -> Option<RoomSnapshot> {
            None
        }

        async fn place_bet(&self, _room_id: &str, _request: BetRequest) -> Result<BetConfirmation, GameError> {
            Err(GameError::BettingClosed)
        }

        fn tick(&self, _room_id: &str) -> Result<Option<RoundSettlement>, GameError> {
            panic!("room state corrupted");
        }

        async fn settle(&self, _settlement: RoundSettlement) -> SettlementReport {
            SettlementReport::default()
        }

        async fn reset_room(&self, room_id: &str) -> Result<SettlementReport, GameError> {
            Err(GameError::RoomNotFound(room_id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_panicking_room_does_not_stall_others() {
        let bench = TestBench::new().unwrap();
        bench.store.insert_user("alice", "Alice", Amount::from_units(100));
        bench.outcomes.push_coin(CoinSide::Heads);
        let coinflip = Arc::new(CoinFlipEngine::new(bench.context(), &bench.config.rooms.coinflip));
        coinflip
            .place_bet(
                "standard",
                BetRequest {
                    user_id: "alice".to_string(),
                    amount: 10.0,
                    bet_type: Some("HEADS".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let scheduler = RoundScheduler::new(
            vec![Arc::new(PanickingEngine), coinflip.clone()],
            Duration::from_secs(1),
        );

        let mut settlements = 0;
        for _ in 0..15 {
            settlements += scheduler.tick_all();
        }
        // Both coin flip rooms resolve on the same tick
        assert_eq!(settlements, 2);
        assert_eq!(coinflip.snapshot("standard").unwrap().phase, Phase::Resolving);

        // Let the spawned settlements run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(bench.store.balance("alice"), Some(Amount::from_units(110)));
    }

    #[tokio::test]
    async fn test_timer_updates_once_per_tick() {
        let bench = TestBench::new().unwrap();
        let coinflip = Arc::new(CoinFlipEngine::new(bench.context(), &bench.config.rooms.coinflip));
        let scheduler = RoundScheduler::new(vec![coinflip.clone()], Duration::from_secs(1));

        for _ in 0..3 {
            scheduler.tick_all();
        }
        let snapshot = coinflip.snapshot("vip").unwrap();
        assert_eq!(snapshot.time_left, 12);
        let timers = bench
            .sink
            .names_for(&snapshot.room)
            .into_iter()
            .filter(|name| *name == "timer_update")
            .count();
        assert_eq!(timers, 3);
    }
}
