//! Wiring of engines, hub, router and scheduler
//!
//! Centralizes construction so the binary and the integration tests build the
//! same graph.

use crate::{
    api::{ApiServer, EventRouter, RoomHub},
    common::traits::{BalanceStore, HistoryRecorder},
    config::EngineConfig,
    errors::{CasinoResult, ServerError},
    games::{
        BetLedger, CoinFlipEngine, CrashEngine, EngineContext, EventSink, GameEngine,
        OutcomeSource, RouletteEngine,
    },
    metrics::EngineMetrics,
    scheduler::RoundScheduler,
    storage::InMemoryStore,
};
use std::sync::Arc;
use tracing::info;

/// Fully wired service graph
pub struct Casino {
    pub config: EngineConfig,
    pub hub: Arc<RoomHub>,
    pub router: Arc<EventRouter>,
    pub metrics: Arc<EngineMetrics>,
    pub engines: Vec<Arc<dyn GameEngine>>,
}

impl Casino {
    pub fn scheduler(&self) -> RoundScheduler {
        RoundScheduler::new(self.engines.clone(), self.config.engine.tick_interval())
    }

    pub fn server(&self) -> ApiServer {
        ApiServer::new(
            self.config.server.clone(),
            self.router.clone(),
            self.metrics.clone(),
        )
    }
}

pub struct CasinoFactory;

impl CasinoFactory {
    /// Build every engine over the given collaborators
    pub fn create(
        config: EngineConfig,
        balances: Arc<dyn BalanceStore>,
        history: Arc<dyn HistoryRecorder>,
        outcomes: Arc<dyn OutcomeSource>,
    ) -> CasinoResult<Casino> {
        config.validate()?;

        let metrics = Arc::new(EngineMetrics::new().map_err(ServerError::from)?);
        let hub = Arc::new(RoomHub::new());
        let sink: Arc<dyn EventSink> = hub.clone();
        let ctx = EngineContext::new(
            BetLedger::new(balances, history),
            sink,
            outcomes,
            metrics.clone(),
            config.engine.clone(),
        );

        let engines: Vec<Arc<dyn GameEngine>> = vec![
            Arc::new(CoinFlipEngine::new(ctx.clone(), &config.rooms.coinflip)),
            Arc::new(RouletteEngine::new(ctx.clone(), &config.rooms.roulette)),
            Arc::new(CrashEngine::new(ctx, &config.rooms.crash)),
        ];
        let router = Arc::new(EventRouter::new(engines.clone(), hub.clone()));

        info!(
            "🏗️  Built {} engines with {} rooms",
            engines.len(),
            engines.iter().map(|e| e.room_ids().len()).sum::<usize>()
        );

        Ok(Casino {
            config,
            hub,
            router,
            metrics,
            engines,
        })
    }

    /// In-memory store seeded from the configured users
    pub fn seeded_store(config: &EngineConfig) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for user in &config.users {
            store.insert_user(user.id.clone(), user.name.clone(), user.balance);
        }
        info!("👤 Seeded {} users", config.users.len());
        store
    }
}

