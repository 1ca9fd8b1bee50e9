//! Random outcome generation
//!
//! All draws come from the operating system CSPRNG so clients cannot predict
//! or replay results. Engines receive the generator as an [`OutcomeSource`]
//! so tests can script outcomes.

use super::types::{CoinSide, RouletteOutcome, MAX_ROULETTE_NUMBER};
use crate::common::types::Multiplier;
use rand::{rngs::OsRng, Rng, RngCore};

/// One in this many crash rounds bust instantly at 1.00×
pub const INSTANT_BUST_MODULUS: u32 = 33;

/// Lowest crash point, in hundredths
pub const MIN_CRASH_HUNDREDTHS: u32 = 100;

/// Highest crash point, in hundredths (1000.00×)
pub const MAX_CRASH_HUNDREDTHS: u32 = 100_000;

pub trait OutcomeSource: Send + Sync {
    fn coin_flip(&self) -> CoinSide;

    fn roulette_spin(&self) -> RouletteOutcome;

    fn crash_point(&self) -> Multiplier;
}

/// Production generator backed by `OsRng`
#[derive(Debug, Default, Clone, Copy)]
pub struct SecureOutcomeGenerator;

impl SecureOutcomeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl OutcomeSource for SecureOutcomeGenerator {
    fn coin_flip(&self) -> CoinSide {
        if OsRng.gen_bool(0.5) {
            CoinSide::Heads
        } else {
            CoinSide::Tails
        }
    }

    fn roulette_spin(&self) -> RouletteOutcome {
        RouletteOutcome::from_number(OsRng.gen_range(0..=MAX_ROULETTE_NUMBER))
    }

    fn crash_point(&self) -> Multiplier {
        crash_point_from_hash(OsRng.next_u32())
    }
}

/// Map a uniform 32-bit draw to a crash point.
///
/// `h % 33 == 0` busts at 1.00×. Otherwise the point is
/// `floor((100·2³² − h) / (2³² − h))` hundredths, clamped to 1.00×..=1000.00×,
/// which gives the heavy-tailed curve with a fixed house edge.
pub fn crash_point_from_hash(h: u32) -> Multiplier {
    if h % INSTANT_BUST_MODULUS == 0 {
        return Multiplier::ONE;
    }
    let e: u64 = 1 << 32;
    let h = h as u64;
    let hundredths = (100 * e - h) / (e - h);
    let clamped = hundredths.clamp(MIN_CRASH_HUNDREDTHS as u64, MAX_CRASH_HUNDREDTHS as u64);
    Multiplier::from_hundredths(clamped as u32)
}

/// Multiplier reached `elapsed_secs` into a crash round: `e^(0.06·t)` to two decimals
pub fn flight_multiplier(elapsed_secs: f64, growth_rate: f64) -> Multiplier {
    Multiplier::from_f64((growth_rate * elapsed_secs.max(0.0)).exp())
}
