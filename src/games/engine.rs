//! Game engine contract and the pieces every variant shares
//!
//! Each engine exclusively owns its rooms. Room state sits behind a
//! `std::sync::Mutex` that is never held across an `.await`; the only
//! suspension points are ledger calls, after which the room is re-validated.

use super::events::{EventSink, OutboundEvent};
use super::outcome::OutcomeSource;
use super::room::{HasRoom, Room, RoomConfig, RoomSnapshot};
use super::settlement::{BetLedger, RoundSettlement, SettlementLine, SettlementReport};
use super::types::{
    Bet, BetConfirmation, BetRequest, CashOutReceipt, GameType, RoomAddress, Wager,
};
use crate::common::{lock, types::{Amount, TransactionKind}};
use crate::config::TimingConfig;
use crate::errors::GameError;
use crate::metrics::EngineMetrics;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Result descriptor recorded for bets voided by a forced reset
pub const VOID_RESULT: &str = "VOID";

/// Identity reserved for anonymous visitors
pub const GUEST_USER_ID: &str = "guest";

/// Collaborators injected into every engine
#[derive(Clone)]
pub struct EngineContext {
    pub ledger: BetLedger,
    pub sink: Arc<dyn EventSink>,
    pub outcomes: Arc<dyn OutcomeSource>,
    pub metrics: Arc<EngineMetrics>,
    pub timing: TimingConfig,
}

impl EngineContext {
    pub fn new(
        ledger: BetLedger,
        sink: Arc<dyn EventSink>,
        outcomes: Arc<dyn OutcomeSource>,
        metrics: Arc<EngineMetrics>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            ledger,
            sink,
            outcomes,
            metrics,
            timing,
        }
    }

    pub fn broadcast(&self, room: &RoomAddress, event: OutboundEvent) {
        self.sink.broadcast(room, event);
    }

    /// Run a round's settlement and account for it in the metrics
    pub async fn settle(&self, settlement: RoundSettlement) -> SettlementReport {
        let report = self.ledger.settle(&settlement).await;
        let game = settlement.game_type();
        self.metrics.payout(game, report.paid_out.cents());
        self.metrics.round_settled(game, report.failures());

        if report.failures() > 0 {
            warn!(
                "⚠️  {} round {} settled with {} failures ({} bets)",
                settlement.room,
                settlement.round_id,
                report.failures(),
                report.bets
            );
        } else {
            info!(
                "💰 {} round {} settled: {} bets, {} credited, {} paid out",
                settlement.room, settlement.round_id, report.bets, report.credited, report.paid_out
            );
        }
        report
    }
}

/// A game variant operating over its own set of rooms
#[async_trait]
pub trait GameEngine: Send + Sync {
    fn game_type(&self) -> GameType;

    fn room_ids(&self) -> Vec<String>;

    /// Current state of a room, `None` if this engine has no such room
    fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot>;

    async fn place_bet(&self, room_id: &str, request: BetRequest) -> Result<BetConfirmation, GameError>;

    async fn cash_out(&self, _room_id: &str, _user_id: &str) -> Result<CashOutReceipt, GameError> {
        Err(GameError::Unsupported(self.game_type().to_string()))
    }

    /// Advance one room by one scheduler tick. Returns settlement work when a
    /// round has just been resolved.
    fn tick(&self, room_id: &str) -> Result<Option<RoundSettlement>, GameError>;

    async fn settle(&self, settlement: RoundSettlement) -> SettlementReport;

    /// Abandon the current round and open a new one. Unsettled stakes are refunded.
    async fn reset_room(&self, room_id: &str) -> Result<SettlementReport, GameError>;
}

/// The fixed set of rooms an engine owns
pub struct RoomTable<T> {
    game_type: GameType,
    rooms: BTreeMap<String, Arc<Mutex<T>>>,
}

impl<T: HasRoom> RoomTable<T> {
    pub fn new<F>(game_type: GameType, configs: &BTreeMap<String, RoomConfig>, build: F) -> Self
    where
        F: Fn(Room) -> T,
    {
        let rooms = configs
            .iter()
            .map(|(id, config)| {
                let room = Room::new(RoomAddress::new(game_type, id.clone()), config.clone());
                (id.clone(), Arc::new(Mutex::new(build(room))))
            })
            .collect();
        Self { game_type, rooms }
    }

    pub fn get(&self, room_id: &str) -> Result<&Arc<Mutex<T>>, GameError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| GameError::RoomNotFound(RoomAddress::new(self.game_type, room_id).to_string()))
    }

    pub fn ids(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    pub fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.rooms.get(room_id).map(|slot| lock(slot).snapshot())
    }
}

/// Validate, debit and record a bet.
///
/// Validation order: phase open, amount numeric and positive, table minimum,
/// authenticated user, then the variant's wager. A debit that lands after the
/// round closed is refunded and the bet rejected.
pub async fn accept_bet<T, F>(
    ctx: &EngineContext,
    slot: &Mutex<T>,
    request: BetRequest,
    parse_wager: F,
) -> Result<BetConfirmation, GameError>
where
    T: HasRoom,
    F: FnOnce(&BetRequest) -> Result<Wager, GameError> + Send,
{
    let (address, round_id, min_bet) = {
        let guard = lock(slot);
        let room = guard.room();
        (room.address.clone(), room.round_id, room.config.min_bet)
    };

    let result = place(ctx, slot, &address, round_id, min_bet, request, parse_wager).await;
    if let Err(e) = &result {
        ctx.metrics.bet_rejected(address.game_type);
        debug!("Bet in {} rejected: {}", address, e);
    }
    result
}

async fn place<T, F>(
    ctx: &EngineContext,
    slot: &Mutex<T>,
    address: &RoomAddress,
    round_id: u64,
    min_bet: Amount,
    request: BetRequest,
    parse_wager: F,
) -> Result<BetConfirmation, GameError>
where
    T: HasRoom,
    F: FnOnce(&BetRequest) -> Result<Wager, GameError> + Send,
{
    if !lock(slot).room().accepts_bets_for(round_id) {
        return Err(GameError::BettingClosed);
    }
    let amount = Amount::from_f64(request.amount).ok_or(GameError::InvalidAmount)?;
    if amount < min_bet {
        return Err(GameError::BelowMinimum { min: min_bet });
    }
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() || user_id == GUEST_USER_ID {
        return Err(GameError::Unauthenticated);
    }
    let wager = parse_wager(&request)?;

    // An empty name shows as the user id
    let user_name = request.user_name.trim().to_string();

    let new_balance = ctx.ledger.debit(&user_id, amount).await?;

    {
        let mut guard = lock(slot);
        let room = guard.room_mut();
        if room.accepts_bets_for(round_id) {
            let bet = Bet::new(user_id, user_name, amount, wager);
            let activity = format!(
                "Player {} bet {}$ on {}",
                bet.display_name(),
                amount,
                wager.label()
            );
            room.bets.push(bet.clone());
            ctx.broadcast(address, OutboundEvent::NewBet(bet));
            ctx.broadcast(address, OutboundEvent::NewActivity(activity));
            ctx.metrics.bet_accepted(address.game_type);
            return Ok(BetConfirmation { amount, new_balance });
        }
    }

    warn!(
        "Debit for {} in {} landed after round {} closed, refunding {}",
        user_id, address, round_id, amount
    );
    match ctx.ledger.credit(&user_id, amount, TransactionKind::Refund).await {
        Ok(_) => ctx.metrics.refund(address.game_type),
        Err(e) => error!("Refund of {} to {} failed: {}", amount, user_id, e),
    }
    Err(GameError::BettingClosed)
}

/// Count down the betting timer and publish it. True when it just ran out.
pub fn tick_betting(ctx: &EngineContext, room: &mut Room) -> bool {
    let left = room.count_down();
    ctx.broadcast(&room.address, OutboundEvent::TimerUpdate(left));
    left == 0
}

/// Open the next betting round and announce it. Returns the dropped bets.
pub fn open_new_round(ctx: &EngineContext, room: &mut Room) -> Vec<Bet> {
    let dropped = room.start_new_round();
    ctx.broadcast(&room.address, OutboundEvent::NewRoundStarted);
    debug!("{} opened round {}", room.address, room.round_id);
    dropped
}

/// Settlement for bets thrown out of a round before it resolved. Open stakes
/// are refunded; cashed-out stakes were already paid and are only recorded.
pub fn void_settlement(address: &RoomAddress, round_id: u64, bets: Vec<Bet>) -> RoundSettlement {
    let lines = bets
        .into_iter()
        .filter(|bet| !bet.settled)
        .map(|bet| match bet.cashout_multiplier {
            Some(multiplier) if bet.cashed_out => {
                SettlementLine::paid(bet.user_id, bet.amount, bet.amount.scaled_by(multiplier))
            }
            _ => SettlementLine::refund(bet.user_id, bet.amount),
        })
        .collect();
    RoundSettlement {
        room: address.clone(),
        round_id,
        result: VOID_RESULT.to_string(),
        lines,
    }
}

/// Shared forced reset for the fixed-phase engines
pub async fn reset_timed_room(ctx: &EngineContext, slot: &Mutex<Room>) -> SettlementReport {
    let settlement = {
        let mut room = lock(slot);
        let (phase, round_id) = (room.phase, room.round_id);
        let dropped = open_new_round(ctx, &mut room);
        info!("🔄 {} reset during {} of round {}", room.address, phase, round_id);
        void_settlement(&room.address, round_id, dropped)
    };
    ctx.settle(settlement).await
}
