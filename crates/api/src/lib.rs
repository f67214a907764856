//! Liveness probe.
//!
//! Endpoints:
//! - GET /health: process status plus a passive check of the consumed queue

pub mod routes;
pub mod server;
pub mod state;
