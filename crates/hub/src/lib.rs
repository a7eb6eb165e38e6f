//! The livetext hub: WebSocket broadcast fan-out, editing sessions,
//! permission resolution, presence, and the HTTP polling fallback.

pub mod config;
pub mod error;
pub mod hub;
pub mod permissions;
pub mod presence;
pub mod response;
pub mod router;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod ws;
