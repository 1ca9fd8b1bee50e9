//! Round-based game engines
//!
//! One engine per variant, each owning its rooms and advancing them through
//! their phases when the scheduler ticks.

pub mod coinflip;
pub mod crash;
pub mod engine;
pub mod events;
pub mod outcome;
pub mod room;
pub mod roulette;
pub mod settlement;
pub mod testing;
pub mod types;

pub use coinflip::CoinFlipEngine;
pub use crash::{CrashEngine, FlightStep};
pub use engine::{EngineContext, GameEngine};
pub use events::{EventSink, NullSink, OutboundEvent};
pub use outcome::{OutcomeSource, SecureOutcomeGenerator};
pub use room::{RoomConfig, RoomSnapshot};
pub use roulette::RouletteEngine;
pub use settlement::{BetLedger, RoundSettlement, SettlementReport};
pub use types::*;
