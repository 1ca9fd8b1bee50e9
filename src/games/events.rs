//! Outbound events and the sink engines publish them through
//!
//! Frames are `{"event": "<name>", "data": <payload>}`.

use super::room::RoomSnapshot;
use super::types::{Bet, RoomAddress, RoundResult};
use crate::common::types::{Amount, Multiplier};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum OutboundEvent {
    InitState(RoomSnapshot),
    TimerUpdate(u32),
    NewRoundStarted,
    RoundResult(RoundResult),
    GameStarted { crash_point: Multiplier },
    MultiplierUpdate { multiplier: Multiplier },
    GameCrashed { multiplier: Multiplier },
    HistoryUpdate(Vec<RoundResult>),
    NewBet(Bet),
    NewActivity(String),
    BetConfirmed { amount: Amount, new_balance: Amount },
    BetRejected { reason: String },
    BetError(String),
    CrashCashedOut { multiplier: Multiplier, profit: Amount },
    CrashPlayerWon { user_name: String, multiplier: Multiplier },
    CrashError { reason: String },
}

impl OutboundEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::InitState(_) => "init_state",
            OutboundEvent::TimerUpdate(_) => "timer_update",
            OutboundEvent::NewRoundStarted => "new_round_started",
            OutboundEvent::RoundResult(_) => "round_result",
            OutboundEvent::GameStarted { .. } => "game_started",
            OutboundEvent::MultiplierUpdate { .. } => "multiplier_update",
            OutboundEvent::GameCrashed { .. } => "game_crashed",
            OutboundEvent::HistoryUpdate(_) => "history_update",
            OutboundEvent::NewBet(_) => "new_bet",
            OutboundEvent::NewActivity(_) => "new_activity",
            OutboundEvent::BetConfirmed { .. } => "bet_confirmed",
            OutboundEvent::BetRejected { .. } => "bet_rejected",
            OutboundEvent::BetError(_) => "bet_error",
            OutboundEvent::CrashCashedOut { .. } => "crash_cashed_out",
            OutboundEvent::CrashPlayerWon { .. } => "crash_player_won",
            OutboundEvent::CrashError { .. } => "crash_error",
        }
    }
}

/// Room-addressed broadcast capability handed to every engine.
///
/// Implementations must not block: engines call this while holding a room lock.
pub trait EventSink: Send + Sync {
    fn broadcast(&self, room: &RoomAddress, event: OutboundEvent);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn broadcast(&self, _room: &RoomAddress, _event: OutboundEvent) {}
}
