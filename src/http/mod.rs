//! HTTP and WebSocket boundary
//!
//! This module exposes the service's outer surface:
//! - GET / - service banner
//! - GET /health - status and active session count
//! - GET /api/custom-transcriber - WebSocket relay endpoint

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
