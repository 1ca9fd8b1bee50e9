//! Engine metrics exported in Prometheus text format

use crate::errors::ServerError;
use crate::games::types::GameType;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "casino";

pub struct EngineMetrics {
    registry: Registry,
    bets_accepted: IntCounterVec,
    bets_rejected: IntCounterVec,
    refunds: IntCounterVec,
    payouts_cents: IntCounterVec,
    cashouts: IntCounterVec,
    rounds_settled: IntCounterVec,
    settlement_failures: IntCounterVec,
    websocket_connections: IntGauge,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let by_game = |name: &str, help: &str| -> Result<IntCounterVec, prometheus::Error> {
            let counter = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["game"])?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let bets_accepted = by_game("bets_accepted_total", "Bets debited and added to a round")?;
        let bets_rejected = by_game("bets_rejected_total", "Bets rejected by validation or the ledger")?;
        let refunds = by_game("refunds_total", "Stakes returned after a round closed or was reset")?;
        let payouts_cents = by_game("payouts_cents_total", "Winnings credited, in cents")?;
        let cashouts = by_game("cashouts_total", "Accepted crash cash-outs")?;
        let rounds_settled = by_game("rounds_settled_total", "Rounds whose settlement finished")?;
        let settlement_failures = by_game(
            "settlement_failures_total",
            "Credits or history writes that failed during settlement",
        )?;

        let websocket_connections = IntGauge::with_opts(
            Opts::new("websocket_connections", "Open websocket connections").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(websocket_connections.clone()))?;

        Ok(Self {
            registry,
            bets_accepted,
            bets_rejected,
            refunds,
            payouts_cents,
            cashouts,
            rounds_settled,
            settlement_failures,
            websocket_connections,
        })
    }

    pub fn bet_accepted(&self, game: GameType) {
        self.bets_accepted.with_label_values(&[game.prefix()]).inc();
    }

    pub fn bet_rejected(&self, game: GameType) {
        self.bets_rejected.with_label_values(&[game.prefix()]).inc();
    }

    pub fn refund(&self, game: GameType) {
        self.refunds.with_label_values(&[game.prefix()]).inc();
    }

    pub fn payout(&self, game: GameType, cents: i64) {
        if cents > 0 {
            self.payouts_cents
                .with_label_values(&[game.prefix()])
                .inc_by(cents as u64);
        }
    }

    pub fn cashout(&self, game: GameType) {
        self.cashouts.with_label_values(&[game.prefix()]).inc();
    }

    pub fn round_settled(&self, game: GameType, failures: usize) {
        self.rounds_settled.with_label_values(&[game.prefix()]).inc();
        if failures > 0 {
            self.settlement_failures
                .with_label_values(&[game.prefix()])
                .inc_by(failures as u64);
        }
    }

    /// A credit that failed after its bet was already settled
    pub fn settlement_failed(&self, game: GameType) {
        self.settlement_failures
            .with_label_values(&[game.prefix()])
            .inc();
    }

    pub fn connection_opened(&self) {
        self.websocket_connections.inc();
    }

    pub fn connection_closed(&self) {
        self.websocket_connections.dec();
    }

    pub fn bets_accepted_for(&self, game: GameType) -> u64 {
        self.bets_accepted.with_label_values(&[game.prefix()]).get()
    }

    pub fn rounds_settled_for(&self, game: GameType) -> u64 {
        self.rounds_settled.with_label_values(&[game.prefix()]).get()
    }

    /// Render every metric in the text exposition format
    pub fn render(&self) -> Result<String, ServerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ServerError::Metrics(prometheus::Error::Msg(e.to_string())))
    }
}
