//! Request orchestration.
//!
//! For each request the [`RequestGate`] resolves the cache policy for its
//! path, answers from the cache on a hit, and otherwise waits on the rate
//! limiter before asking the transport for a fresh payload, which it then
//! stores.

mod client;
mod request;
mod stats;

pub use client::{CacheInfo, RequestGate, RequestGateBuilder};
pub use request::{GateResponse, Provenance, RequestDescriptor};
pub use stats::{CallStats, CallStatsSnapshot};
