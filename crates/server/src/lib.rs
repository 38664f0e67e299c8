//! Live report server.
//!
//! Serves the output directory over HTTP, keeps connected dashboards in sync
//! over a WebSocket push channel (`/ws`, same port) and watches the output
//! directory so that any rewrite of the report reaches every client.

mod config;
mod error;
mod hub;
mod port;
mod routes;
mod server;
mod watcher;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use hub::{ClientId, PushHub, REPORT_UNAVAILABLE};
pub use port::find_available_port;
pub use server::{LiveSyncHandle, LiveSyncServer};
