//! HTTP API server for membank.
//!
//! Exposes the performance monitor as JSON and receives Stripe webhook
//! deliveries, counting them in an in-memory ledger.

pub mod monitoring;
pub mod rate_limiter;
pub mod server;
pub mod stripe;

pub use server::{build_router, run_server, AppState};
