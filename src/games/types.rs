use crate::common::types::{Amount, Multiplier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Supported game variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    CoinFlip,
    Roulette,
    #[serde(rename = "crashgame")]
    Crash,
}

impl GameType {
    pub const ALL: [GameType; 3] = [GameType::CoinFlip, GameType::Roulette, GameType::Crash];

    /// Prefix used in room addresses
    pub fn prefix(self) -> &'static str {
        match self {
            GameType::CoinFlip => "coinflip",
            GameType::Roulette => "roulette",
            GameType::Crash => "crashgame",
        }
    }

    /// Name written to permanent history records
    pub fn record_name(self) -> &'static str {
        match self {
            GameType::CoinFlip => "COINFLIP",
            GameType::Roulette => "ROULETTE",
            GameType::Crash => "CRASHGAME",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        GameType::ALL.into_iter().find(|game| game.prefix() == prefix)
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Typed room address, written as `"<gameType>-<roomId>"` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomAddress {
    pub game_type: GameType,
    pub room_id: String,
}

impl RoomAddress {
    pub fn new(game_type: GameType, room_id: impl Into<String>) -> Self {
        Self {
            game_type,
            room_id: room_id.into(),
        }
    }

    /// Parse `"crashgame-standard"`. Unknown games and empty ids yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (prefix, room_id) = text.split_once('-')?;
        let game_type = GameType::from_prefix(prefix)?;
        if room_id.is_empty() {
            return None;
        }
        Some(Self::new(game_type, room_id))
    }
}

impl fmt::Display for RoomAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.game_type.prefix(), self.room_id)
    }
}

impl Serialize for RoomAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Round phase. Each engine uses its own subset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Betting,
    Resolving,
    Rolling,
    Running,
    Crashed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Betting => "BETTING",
            Phase::Resolving => "RESOLVING",
            Phase::Rolling => "ROLLING",
            Phase::Running => "RUNNING",
            Phase::Crashed => "CRASHED",
        };
        f.write_str(name)
    }
}

/// Coin side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoinSide {
    Heads,
    Tails,
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinSide::Heads => write!(f, "HEADS"),
            CoinSide::Tails => write!(f, "TAILS"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouletteColor {
    Red,
    Black,
    Green,
}

impl fmt::Display for RouletteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouletteColor::Red => write!(f, "RED"),
            RouletteColor::Black => write!(f, "BLACK"),
            RouletteColor::Green => write!(f, "GREEN"),
        }
    }
}

/// Red pockets of a European wheel
pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// Highest pocket on the wheel
pub const MAX_ROULETTE_NUMBER: u8 = 36;

/// Winning pocket and its color
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteOutcome {
    pub number: u8,
    pub color: RouletteColor,
}

impl RouletteOutcome {
    pub fn from_number(number: u8) -> Self {
        let color = if number == 0 {
            RouletteColor::Green
        } else if RED_NUMBERS.contains(&number) {
            RouletteColor::Red
        } else {
            RouletteColor::Black
        };
        Self { number, color }
    }

    /// History descriptor, e.g. `NUM_17_COLOR_BLACK`
    pub fn descriptor(&self) -> String {
        format!("NUM_{}_COLOR_{}", self.number, self.color)
    }
}

/// Realized outcome of one round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RoundResult {
    Coin(CoinSide),
    Roulette(RouletteOutcome),
    Crash(Multiplier),
}

impl RoundResult {
    /// Text stored in the permanent history record
    pub fn descriptor(&self) -> String {
        match self {
            RoundResult::Coin(side) => side.to_string(),
            RoundResult::Roulette(outcome) => outcome.descriptor(),
            RoundResult::Crash(point) => point.to_string(),
        }
    }
}

/// What a bet is placed on
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "betType", content = "betValue", rename_all = "UPPERCASE")]
pub enum Wager {
    Heads,
    Tails,
    Red,
    Black,
    Number(u8),
    /// Crash stake with no selection; rides the multiplier
    Ride,
}

impl Wager {
    pub fn coin(side: CoinSide) -> Self {
        match side {
            CoinSide::Heads => Wager::Heads,
            CoinSide::Tails => Wager::Tails,
        }
    }

    /// Label used in activity messages
    pub fn label(&self) -> String {
        match self {
            Wager::Heads => "HEADS".to_string(),
            Wager::Tails => "TAILS".to_string(),
            Wager::Red => "RED".to_string(),
            Wager::Black => "BLACK".to_string(),
            Wager::Number(n) => format!("NUMBER {}", n),
            Wager::Ride => "the rocket".to_string(),
        }
    }
}

/// One accepted wager. `settled` only ever goes from false to true; `cashed_out`
/// is undone only when the cash-out credit fails before the round settles.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub user_id: String,
    pub user_name: String,
    pub amount: Amount,
    #[serde(flatten)]
    pub wager: Wager,
    pub settled: bool,
    pub cashed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashout_multiplier: Option<Multiplier>,
    pub placed_at: DateTime<Utc>,
}

impl Bet {
    pub fn new(user_id: String, user_name: String, amount: Amount, wager: Wager) -> Self {
        Self {
            user_id,
            user_name,
            amount,
            wager,
            settled: false,
            cashed_out: false,
            cashout_multiplier: None,
            placed_at: Utc::now(),
        }
    }

    /// Name shown to other players
    pub fn display_name(&self) -> &str {
        if self.user_name.is_empty() {
            &self.user_id
        } else {
            &self.user_name
        }
    }
}

/// Bet request after transport decoding, before validation
#[derive(Debug, Clone, Default)]
pub struct BetRequest {
    pub user_id: String,
    pub user_name: String,
    /// NaN when the client sent something other than a number
    pub amount: f64,
    pub bet_type: Option<String>,
    pub bet_value: Option<serde_json::Value>,
}

/// Reply to an accepted bet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetConfirmation {
    pub amount: Amount,
    pub new_balance: Amount,
}

/// Reply to an accepted crash cash-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashOutReceipt {
    pub multiplier: Multiplier,
    pub payout: Amount,
    pub new_balance: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_address_parsing() {
        let address = RoomAddress::parse("crashgame-standard").unwrap();
        assert_eq!(address.game_type, GameType::Crash);
        assert_eq!(address.room_id, "standard");
        assert_eq!(address.to_string(), "crashgame-standard");

        let hyphenated = RoomAddress::parse("roulette-high-roller").unwrap();
        assert_eq!(hyphenated.room_id, "high-roller");

        assert!(RoomAddress::parse("blackjack-standard").is_none());
        assert!(RoomAddress::parse("coinflip-").is_none());
        assert!(RoomAddress::parse("standard").is_none());
    }

    #[test]
    fn test_roulette_colors() {
        assert_eq!(RouletteOutcome::from_number(0).color, RouletteColor::Green);
        assert_eq!(RouletteOutcome::from_number(17).color, RouletteColor::Black);
        assert_eq!(RouletteOutcome::from_number(32).color, RouletteColor::Red);
        assert_eq!(
            RouletteOutcome::from_number(17).descriptor(),
            "NUM_17_COLOR_BLACK"
        );

        let reds = (0..=MAX_ROULETTE_NUMBER)
            .filter(|n| RouletteOutcome::from_number(*n).color == RouletteColor::Red)
            .count();
        assert_eq!(reds, 18);
    }

    #[test]
    fn test_bet_wire_format() {
        let bet = Bet::new(
            "u1".to_string(),
            "Alice".to_string(),
            Amount::from_units(10),
            Wager::Number(17),
        );
        let json = serde_json::to_value(&bet).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["betType"], "NUMBER");
        assert_eq!(json["betValue"], 17);
        assert_eq!(json["amount"], 10.0);
        assert!(json.get("cashoutMultiplier").is_none());
    }

    #[test]
    fn test_round_result_descriptors() {
        assert_eq!(RoundResult::Coin(CoinSide::Heads).descriptor(), "HEADS");
        assert_eq!(
            RoundResult::Crash(Multiplier::from_hundredths(300)).descriptor(),
            "3.00"
        );
        let json = serde_json::to_value(RoundResult::Coin(CoinSide::Tails)).unwrap();
        assert_eq!(json, "TAILS");
    }
}
