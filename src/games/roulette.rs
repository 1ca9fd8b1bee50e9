//! Roulette engine
//!
//! `BETTING → ROLLING (5s) → BETTING`. Colors pay 2×, a straight number 36×.

use super::engine::{
    accept_bet, open_new_round, reset_timed_room, tick_betting, EngineContext, GameEngine, RoomTable,
};
use super::events::OutboundEvent;
use super::room::{Room, RoomConfig, RoomSnapshot};
use super::settlement::{RoundSettlement, SettlementLine, SettlementReport};
use super::types::{
    BetConfirmation, BetRequest, GameType, Phase, RouletteColor, RouletteOutcome, RoundResult,
    Wager, MAX_ROULETTE_NUMBER,
};
use crate::common::lock;
use crate::errors::GameError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const COLOR_PAYOUT: i64 = 2;
pub const NUMBER_PAYOUT: i64 = 36;

pub struct RouletteEngine {
    ctx: EngineContext,
    rooms: RoomTable<Room>,
}

impl RouletteEngine {
    pub fn new(ctx: EngineContext, rooms: &BTreeMap<String, RoomConfig>) -> Self {
        info!("🎡 Roulette initialized with {} rooms", rooms.len());
        Self {
            ctx,
            rooms: RoomTable::new(GameType::Roulette, rooms, |room| room),
        }
    }

    fn spin(&self, room: &mut Room) -> RoundSettlement {
        room.enter(Phase::Rolling, self.ctx.timing.roulette_roll_seconds);

        let outcome = self.ctx.outcomes.roulette_spin();
        let result = RoundResult::Roulette(outcome);
        room.history.push(result);
        self.ctx.broadcast(&room.address, OutboundEvent::RoundResult(result));
        self.ctx
            .broadcast(&room.address, OutboundEvent::HistoryUpdate(room.history.to_vec()));

        let lines = room
            .bets
            .iter_mut()
            .filter(|bet| !bet.settled)
            .map(|bet| {
                bet.settled = true;
                match payout_factor(bet.wager, outcome) {
                    Some(factor) => SettlementLine::win(
                        bet.user_id.clone(),
                        bet.amount,
                        bet.amount.times(factor),
                    ),
                    None => SettlementLine::loss(bet.user_id.clone(), bet.amount),
                }
            })
            .collect::<Vec<_>>();

        info!(
            "🎡 {} round {} landed {} {} ({} bets)",
            room.address,
            room.round_id,
            outcome.number,
            outcome.color,
            lines.len()
        );

        RoundSettlement {
            room: room.address.clone(),
            round_id: room.round_id,
            result: outcome.descriptor(),
            lines,
        }
    }
}

/// Winning multiple for a wager, `None` on a loss
pub fn payout_factor(wager: Wager, outcome: RouletteOutcome) -> Option<i64> {
    match wager {
        Wager::Red if outcome.color == RouletteColor::Red => Some(COLOR_PAYOUT),
        Wager::Black if outcome.color == RouletteColor::Black => Some(COLOR_PAYOUT),
        Wager::Number(n) if n == outcome.number => Some(NUMBER_PAYOUT),
        _ => None,
    }
}

/// Parse `betType` and, for NUMBER, the `betValue` target
pub fn parse_wager(request: &BetRequest) -> Result<Wager, GameError> {
    match request.bet_type.as_deref() {
        Some("RED") => Ok(Wager::Red),
        Some("BLACK") => Ok(Wager::Black),
        Some("NUMBER") => request
            .bet_value
            .as_ref()
            .and_then(parse_target)
            .map(Wager::Number)
            .ok_or(GameError::MissingTarget),
        _ => Err(GameError::InvalidSelection(
            "Use RED, BLACK or NUMBER".to_string(),
        )),
    }
}

/// Target pocket sent either as a number or a numeric string
fn parse_target(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u8::try_from(number)
        .ok()
        .filter(|n| *n <= MAX_ROULETTE_NUMBER)
}

#[async_trait]
impl GameEngine for RouletteEngine {
    fn game_type(&self) -> GameType {
        GameType::Roulette
    }

    fn room_ids(&self) -> Vec<String> {
        self.rooms.ids()
    }

    fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.rooms.snapshot(room_id)
    }

    async fn place_bet(&self, room_id: &str, request: BetRequest) -> Result<BetConfirmation, GameError> {
        let slot = self.rooms.get(room_id)?;
        accept_bet(&self.ctx, slot.as_ref(), request, parse_wager).await
    }

    fn tick(&self, room_id: &str) -> Result<Option<RoundSettlement>, GameError> {
        let slot = self.rooms.get(room_id)?;
        let mut room = lock(slot);
        match room.phase {
            Phase::Betting => {
                if tick_betting(&self.ctx, &mut room) {
                    return Ok(Some(self.spin(&mut room)));
                }
            }
            Phase::Rolling => {
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
