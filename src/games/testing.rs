//! Deterministic collaborators for driving engines in tests
//!
//! [`ScriptedOutcomes`] replays queued results, [`RecordingSink`] captures
//! every broadcast and [`TestBench`] wires both to an in-memory store.

use super::engine::EngineContext;
use super::events::{EventSink, OutboundEvent};
use super::outcome::OutcomeSource;
use super::settlement::BetLedger;
use super::types::{CoinSide, RoomAddress, RouletteOutcome};
use crate::common::{lock, types::Multiplier};
use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;
use crate::storage::InMemoryStore;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Outcome source that plays back queued results.
///
/// When a queue runs dry it falls back to HEADS, pocket 0 and a 2.00× crash.
#[derive(Debug, Default)]
pub struct ScriptedOutcomes {
    coins: Mutex<VecDeque<CoinSide>>,
    spins: Mutex<VecDeque<u8>>,
    crash_points: Mutex<VecDeque<Multiplier>>,
}

impl ScriptedOutcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_coin(&self, side: CoinSide) {
        lock(&self.coins).push_back(side);
    }

    pub fn push_spin(&self, number: u8) {
        lock(&self.spins).push_back(number);
    }

    pub fn push_crash_point(&self, point: Multiplier) {
        lock(&self.crash_points).push_back(point);
    }
}

impl OutcomeSource for ScriptedOutcomes {
    fn coin_flip(&self) -> CoinSide {
        lock(&self.coins).pop_front().unwrap_or(CoinSide::Heads)
    }

    fn roulette_spin(&self) -> RouletteOutcome {
        RouletteOutcome::from_number(lock(&self.spins).pop_front().unwrap_or(0))
    }

    fn crash_point(&self) -> Multiplier {
        lock(&self.crash_points)
            .pop_front()
            .unwrap_or(Multiplier::from_hundredths(200))
    }
}

/// Sink that keeps every broadcast in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(RoomAddress, OutboundEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events_for(&self, room: &RoomAddress) -> Vec<OutboundEvent> {
        lock(&self.events)
            .iter()
            .filter(|(address, _)| address == room)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn names_for(&self, room: &RoomAddress) -> Vec<&'static str> {
        lock(&self.events)
            .iter()
            .filter(|(address, _)| address == room)
            .map(|(_, event)| event.name())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        lock(&self.events)
            .iter()
            .filter(|(_, event)| event.name() == name)
            .count()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl EventSink for RecordingSink {
    fn broadcast(&self, room: &RoomAddress, event: OutboundEvent) {
        lock(&self.events).push((room.clone(), event));
    }
}

/// Store, outcomes, sink and metrics for one test
pub struct TestBench {
    pub store: Arc<InMemoryStore>,
    pub outcomes: Arc<ScriptedOutcomes>,
    pub sink: Arc<RecordingSink>,
    pub metrics: Arc<EngineMetrics>,
    pub config: EngineConfig,
}

impl TestBench {
    /// Default room tables. The crash sub-tick is parked at one minute so
    /// tests drive the multiplier by hand.
    pub fn new() -> Result<Self, prometheus::Error> {
        let mut config = EngineConfig::default();
        config.engine.crash_sub_tick_ms = 60_000;

        Ok(Self {
            store: Arc::new(InMemoryStore::new()),
            outcomes: Arc::new(ScriptedOutcomes::new()),
            sink: Arc::new(RecordingSink::new()),
            metrics: Arc::new(EngineMetrics::new()?),
            config,
        })
    }

    pub fn ledger(&self) -> BetLedger {
        BetLedger::new(self.store.clone(), self.store.clone())
    }

    pub fn context(&self) -> EngineContext {
        EngineContext::new(
            self.ledger(),
            self.sink.clone(),
            self.outcomes.clone(),
            self.metrics.clone(),
            self.config.engine.clone(),
        )
    }
}
