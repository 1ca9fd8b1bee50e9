//! Network front end
//!
//! WebSocket game traffic plus a few read-only HTTP endpoints.

pub mod errors;
pub mod handlers;
pub mod hub;
pub mod middleware;
pub mod protocol;
pub mod router;
pub mod routes;
pub mod server;
pub mod websocket;

pub use hub::RoomHub;
pub use protocol::InboundCommand;
pub use router::EventRouter;
pub use server::ApiServer;
