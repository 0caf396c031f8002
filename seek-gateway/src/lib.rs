//! HTTP gateway for the execution service.
//!
//! Owns the route table, the outcome-to-status mapping, and the in-memory
//! execution history. Everything that actually runs code lives in
//! `seek-sandbox`; this crate only translates between HTTP and the service.

pub mod history;
pub mod normalize;
pub mod server;

pub use history::{HistoryStore, StatsData};
pub use normalize::normalize;
pub use server::{create_router, start_server, GatewayState};
