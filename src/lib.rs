//! RateLend ledger library
//!
//! Loan lifecycle state machine, proposal registry, liquidity pool and rate
//! oracle adapter behind an axum HTTP/WebSocket API.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod monitor;
pub mod oracle;
pub mod pool;
pub mod proposal;
pub mod routes;
pub mod state;
pub mod websocket;
