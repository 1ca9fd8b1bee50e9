//! Shared type definitions for the betting engine
//!
//! Monetary values are fixed-point integers so that payouts such as
//! `5.00 × 2.50` settle to exactly `12.50`. On the wire they are plain JSON
//! numbers with two decimals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Cents per currency unit
pub const AMOUNT_SCALE: i64 = 100;

/// Relative slack for `f64` noise when checking for whole cents
const SUB_CENT_TOLERANCE: f64 = 1e-9;

/// Hundredths per multiplier unit
pub const MULTIPLIER_SCALE: u32 = 100;

/// Monetary amount stored as integer cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    /// Whole currency units, e.g. `Amount::from_units(5)` is `5.00`
    pub const fn from_units(units: i64) -> Self {
        Amount(units * AMOUNT_SCALE)
    }

    /// Parse a client-supplied number. Rejects NaN, infinities, zero or
    /// below, fractions of a cent and values too large for the ledger.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let scaled = value * AMOUNT_SCALE as f64;
        let cents = scaled.round();
        if cents < 1.0 || cents >= i64::MAX as f64 {
            return None;
        }
        // Only binary representation noise may separate the value from whole cents
        if (scaled - cents).abs() > SUB_CENT_TOLERANCE * cents {
            return None;
        }
        Some(Amount(cents as i64))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / AMOUNT_SCALE as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Fixed payout factor (2× for even-money, 36× for a straight number)
    pub fn times(self, factor: i64) -> Amount {
        Amount(self.0.saturating_mul(factor))
    }

    /// Scale by a multiplier, rounding half-up to the nearest cent
    pub fn scaled_by(self, multiplier: Multiplier) -> Amount {
        let raw = self.0 as i128 * multiplier.hundredths() as i128;
        let half = MULTIPLIER_SCALE as i128 / 2;
        let cents = (raw + half) / MULTIPLIER_SCALE as i128;
        Amount(cents.min(i64::MAX as i128) as i64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if value == 0.0 {
            return Ok(Amount::ZERO);
        }
        Amount::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {}", value)))
    }
}

/// Payout multiplier stored as integer hundredths (`250` is `2.50×`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Multiplier(u32);

impl Multiplier {
    pub const ONE: Multiplier = Multiplier(MULTIPLIER_SCALE);

    pub const fn from_hundredths(hundredths: u32) -> Self {
        Multiplier(hundredths)
    }

    /// Round a floating value to two decimals
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Multiplier(0);
        }
        let hundredths = (value * MULTIPLIER_SCALE as f64).round();
        Multiplier(hundredths.min(u32::MAX as f64) as u32)
    }

    pub const fn hundredths(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / MULTIPLIER_SCALE as f64
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Multiplier::ONE
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Multiplier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Multiplier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Multiplier::from_f64(f64::deserialize(deserializer)?))
    }
}

/// Account as seen by the user directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub balance: Amount,
}

/// Kind of balance-affecting transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Bet,
    Win,
    Cashout,
    Refund,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Bet => write!(f, "BET"),
            TransactionKind::Win => write!(f, "WIN"),
            TransactionKind::Cashout => write!(f, "CASHOUT"),
            TransactionKind::Refund => write!(f, "REFUND"),
        }
    }
}

/// One balance mutation, appended by the store in the same atomic step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub user_id: String,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub balance_after: Amount,
    pub created_at: DateTime<Utc>,
}

/// Permanent per-bet outcome record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameHistoryRecord {
    pub user_id: String,
    /// Upper-case game name, e.g. `CRASHGAME`
    pub game_type: String,
    pub round_id: u64,
    pub bet: Amount,
    pub payout: Amount,
    /// Result descriptor: `HEADS`, `NUM_17_COLOR_BLACK`, `2.35`
    pub result: String,
    pub created_at: DateTime<Utc>,
}
