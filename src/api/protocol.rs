//! Inbound WebSocket frames
//!
//! Clients send `{"event": "<name>", "data": <payload>}`; outbound frames
//! share the same envelope (see [`crate::games::OutboundEvent`]).

use crate::games::BetRequest;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundCommand {
    JoinRoom(String),
    LeaveRoom(String),
    PlaceBet(PlaceBetPayload),
    CrashCashout(CashOutPayload),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceBetPayload {
    pub room: String,
    pub user_id: String,
    pub user_name: String,
    /// Kept raw so a non-numeric amount is rejected by validation, not parsing
    pub amount: Value,
    pub bet_type: Option<String>,
    pub bet_value: Option<Value>,
}

impl PlaceBetPayload {
    pub fn into_request(self) -> (String, BetRequest) {
        let amount = match &self.amount {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        };
        let request = BetRequest {
            user_id: self.user_id,
            user_name: self.user_name,
            amount,
            bet_type: self.bet_type.map(|t| t.to_uppercase()),
            bet_value: self.bet_value,
        };
        (self.room, request)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CashOutPayload {
    pub room: String,
    pub user_id: String,
}

impl InboundCommand {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
