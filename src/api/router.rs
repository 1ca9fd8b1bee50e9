//! Inbound event dispatch
//!
//! Resolves the target engine from the typed room address and turns engine
//! results into replies on the caller's connection.

use super::hub::RoomHub;
use super::protocol::{CashOutPayload, InboundCommand, PlaceBetPayload};
use crate::errors::GameError;
use crate::games::{GameEngine, GameType, OutboundEvent, RoomAddress, RoomSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct EventRouter {
    engines: HashMap<GameType, Arc<dyn GameEngine>>,
    hub: Arc<RoomHub>,
}

impl EventRouter {
    pub fn new(engines: Vec<Arc<dyn GameEngine>>, hub: Arc<RoomHub>) -> Self {
        let engines = engines
            .into_iter()
            .map(|engine| (engine.game_type(), engine))
            .collect();
        Self { engines, hub }
    }

    pub fn hub(&self) -> &Arc<RoomHub> {
        &self.hub
    }

    pub fn engines(&self) -> Vec<Arc<dyn GameEngine>> {
        GameType::ALL
            .iter()
            .filter_map(|game| self.engines.get(game).cloned())
            .collect()
    }

    pub fn engine(&self, game: GameType) -> Option<&Arc<dyn GameEngine>> {
        self.engines.get(&game)
    }

    /// Current state of every room, ordered by game then room id
    pub fn room_summaries(&self) -> Vec<RoomSnapshot> {
        self.engines()
            .iter()
            .flat_map(|engine| {
                engine
                    .room_ids()
                    .into_iter()
                    .filter_map(|id| engine.snapshot(&id))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub async fn dispatch(&self, connection: &str, command: InboundCommand) {
        match command {
            InboundCommand::JoinRoom(room) => self.join(connection, &room),
            InboundCommand::LeaveRoom(room) => self.leave(connection, &room),
            InboundCommand::PlaceBet(payload) => self.place_bet(connection, payload).await,
            InboundCommand::CrashCashout(payload) => self.cash_out(connection, payload).await,
        }
    }

    /// Subscribe and reply with the room's state. Unknown rooms are ignored.
    pub fn join(&self, connection: &str, room: &str) {
        let Some((address, engine)) = self.resolve(room) else {
            debug!("{} tried to join unknown room {}", connection, room);
            return;
        };
        let Some(snapshot) = engine.snapshot(&address.room_id) else {
            debug!("{} tried to join unknown room {}", connection, room);
            return;
        };
        self.hub.subscribe(connection, &address);
        self.hub.send_to(connection, OutboundEvent::InitState(snapshot));
    }

    pub fn leave(&self, connection: &str, room: &str) {
        if let Some(address) = RoomAddress::parse(room) {
            self.hub.unsubscribe(connection, &address);
        }
    }

    async fn place_bet(&self, connection: &str, payload: PlaceBetPayload) {
        let (room, request) = payload.into_request();
        let result = match self.resolve(&room) {
            Some((address, engine)) => engine.place_bet(&address.room_id, request).await,
            None => Err(GameError::RoomNotFound(room)),
        };

        let reply = match result {
            Ok(confirmation) => OutboundEvent::BetConfirmed {
                amount: confirmation.amount,
                new_balance: confirmation.new_balance,
            },
            Err(e) if e.is_ledger_failure() => OutboundEvent::BetError(e.to_string()),
            Err(e) => OutboundEvent::BetRejected {
                reason: e.to_string(),
            },
        };
        self.hub.send_to(connection, reply);
    }

    async fn cash_out(&self, connection: &str, payload: CashOutPayload) {
        let result = match self.resolve(&payload.room) {
            Some((address, engine)) => engine.cash_out(&address.room_id, &payload.user_id).await,
            None => Err(GameError::RoomNotFound(payload.room)),
        };

        let reply = match result {
            Ok(receipt) => OutboundEvent::CrashCashedOut {
                multiplier: receipt.multiplier,
                profit: receipt.payout,
            },
            Err(e) => OutboundEvent::CrashError {
                reason: e.to_string(),
            },
        };
        self.hub.send_to(connection, reply);
    }

    fn resolve(&self, room: &str) -> Option<(RoomAddress, &Arc<dyn GameEngine>)> {
        let address = RoomAddress::parse(room)?;
        let engine = self.engines.get(&address.game_type)?;
        Some((address, engine))
    }
}
