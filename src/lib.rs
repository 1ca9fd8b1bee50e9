//! Casino rooms - real-time multiplayer betting rooms
//!
//! Runs round-based coin flip, roulette and crash rooms. Each room cycles
//! through its phases on a shared scheduler, accepts wagers over WebSocket,
//! debits and credits an external balance store and records a history entry
//! for every settled bet.

pub mod api;
pub mod common;
pub mod config;
pub mod errors;
pub mod factory;
pub mod games;
pub mod metrics;
pub mod scheduler;
pub mod storage;

pub use errors::{CasinoError, CasinoResult};
pub use factory::{Casino, CasinoFactory};
