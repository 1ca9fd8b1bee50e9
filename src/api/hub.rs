//! Room subscriptions and per-connection delivery
//!
//! Every WebSocket connection registers a bounded outbox. Engines publish
//! through [`EventSink`]; the hub fans each event out to the connections
//! subscribed to that room, in publish order. A connection whose outbox is
//! full is dropped.

use crate::games::{EventSink, OutboundEvent, RoomAddress};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{channel, error::TrySendError, Receiver, Sender};
use tracing::{debug, warn};

pub type ConnectionId = String;

/// Events buffered per connection before it counts as too slow
pub const OUTBOX_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct RoomHub {
    connections: DashMap<ConnectionId, Sender<OutboundEvent>>,
    subscriptions: DashMap<RoomAddress, DashSet<ConnectionId>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and hand back the receiving end of its outbox
    pub fn register(&self, connection: &str) -> Receiver<OutboundEvent> {
        self.register_with_capacity(connection, OUTBOX_CAPACITY)
    }

    pub fn register_with_capacity(&self, connection: &str, capacity: usize) -> Receiver<OutboundEvent> {
        let (tx, rx) = channel(capacity);
        self.connections.insert(connection.to_string(), tx);
        rx
    }

    /// Drop a connection and all of its subscriptions
    pub fn unregister(&self, connection: &str) {
        self.connections.remove(connection);
        for room in self.subscriptions.iter() {
            room.value().remove(connection);
        }
    }

    pub fn subscribe(&self, connection: &str, room: &RoomAddress) {
        self.subscriptions
            .entry(room.clone())
            .or_default()
            .insert(connection.to_string());
        debug!("{} joined {}", connection, room);
    }

    pub fn unsubscribe(&self, connection: &str, room: &RoomAddress) {
        if let Some(members) = self.subscriptions.get(room) {
            members.remove(connection);
        }
        debug!("{} left {}", connection, room);
    }

    pub fn is_subscribed(&self, connection: &str, room: &RoomAddress) -> bool {
        self.subscriptions
            .get(room)
            .map(|members| members.contains(connection))
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self, room: &RoomAddress) -> usize {
        self.subscriptions
            .get(room)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send a reply to one connection
    pub fn send_to(&self, connection: &str, event: OutboundEvent) {
        let delivered = match self.connections.get(connection) {
            Some(outbox) => deliver(connection, &outbox, event),
            None => true,
        };
        if !delivered {
            self.unregister(connection);
        }
    }
}

/// Queue one event. False when the connection is too slow and must go.
fn deliver(connection: &str, outbox: &Sender<OutboundEvent>, event: OutboundEvent) -> bool {
    match outbox.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!(
                "Outbox for {} is full, dropping the connection at {}",
                connection,
                event.name()
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Outbox for {} already closed", connection);
            true
        }
    }
}

impl EventSink for RoomHub {
    fn broadcast(&self, room: &RoomAddress, event: OutboundEvent) {
        let slow: Vec<ConnectionId> = {
            let Some(members) = self.subscriptions.get(room) else {
                return;
            };
            let slow = members
                .iter()
                .filter(|member| match self.connections.get(member.key()) {
                    Some(outbox) => !deliver(member.key(), &outbox, event.clone()),
                    None => false,
                })
                .map(|member| member.key().clone())
                .collect();
            slow
        };
        // Dropping the sender closes the outbox, which ends the connection
        for connection in slow {
            self.unregister(&connection);
        }
    }
}

/// Unique id for a new WebSocket connection
pub fn generate_connection_id() -> ConnectionId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("ws_{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}
