//! Rooms and their round state
//!
//! A room is one betting venue for one game variant. Its configuration is
//! fixed at startup; its round state lives behind the owning engine's lock.

use super::types::{Bet, Phase, RoomAddress, RoundResult};
use crate::common::types::{Amount, Multiplier};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of results kept per room
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Roulette keeps a shorter strip of recent numbers
pub const ROULETTE_HISTORY_CAPACITY: usize = 10;

/// Immutable per-room settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub min_bet: Amount,
    pub round_duration_seconds: u32,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl RoomConfig {
    pub fn new(min_bet: Amount, round_duration_seconds: u32) -> Self {
        Self {
            min_bet,
            round_duration_seconds,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

/// Bounded FIFO of recent results
#[derive(Debug, Clone)]
pub struct ResultHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> ResultHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest entries beyond capacity
    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

/// Round state shared by every variant
#[derive(Debug)]
pub struct Room {
    pub address: RoomAddress,
    pub config: RoomConfig,
    pub phase: Phase,
    pub time_left_seconds: u32,
    /// Generation counter, bumped on every reset
    pub round_id: u64,
    pub bets: Vec<Bet>,
    pub history: ResultHistory<RoundResult>,
}

impl Room {
    pub fn new(address: RoomAddress, config: RoomConfig) -> Self {
        let history = ResultHistory::new(config.history_capacity);
        Self {
            address,
            time_left_seconds: config.round_duration_seconds,
            config,
            phase: Phase::Betting,
            round_id: 1,
            bets: Vec::new(),
            history,
        }
    }

    /// Whether a bet captured during `round_id` may still be appended
    pub fn accepts_bets_for(&self, round_id: u64) -> bool {
        self.phase == Phase::Betting && self.round_id == round_id
    }

    /// Decrement the timer, returning the new value
    pub fn count_down(&mut self) -> u32 {
        self.time_left_seconds = self.time_left_seconds.saturating_sub(1);
        self.time_left_seconds
    }

    /// Enter a fixed-length phase
    pub fn enter(&mut self, phase: Phase, seconds: u32) {
        self.phase = phase;
        self.time_left_seconds = seconds;
    }

    /// Start a fresh betting round. Returns the bets dropped from the old one.
    pub fn start_new_round(&mut self) -> Vec<Bet> {
        self.round_id += 1;
        self.phase = Phase::Betting;
        self.time_left_seconds = self.config.round_duration_seconds;
        std::mem::take(&mut self.bets)
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room: self.address.clone(),
            phase: self.phase,
            time_left: self.time_left_seconds,
            round_id: self.round_id,
            min_bet: self.config.min_bet,
            history: self.history.to_vec(),
            bets: self.bets.clone(),
            multiplier: None,
        }
    }
}

/// Access to the shared round state of a variant-specific room
pub trait HasRoom: Send {
    fn room(&self) -> &Room;
    fn room_mut(&mut self) -> &mut Room;

    fn snapshot(&self) -> RoomSnapshot {
        self.room().snapshot()
    }
}

impl HasRoom for Room {
    fn room(&self) -> &Room {
        self
    }

    fn room_mut(&mut self) -> &mut Room {
        self
    }
}

/// State sent to a client on join and listed over HTTP
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: RoomAddress,
    #[serde(rename = "status")]
    pub phase: Phase,
    pub time_left: u32,
    pub round_id: u64,
    pub min_bet: Amount,
    pub history: Vec<RoundResult>,
    pub bets: Vec<Bet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<Multiplier>,
}
