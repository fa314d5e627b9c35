//! # API Gatekeeper
//!
//! A caching, rate-limited gate in front of rate-limited HTTP APIs.
//!
//! ## Features
//!
//! - Multi-rule sliding window rate limiting shared by concurrent callers
//! - Response caching with per-endpoint TTLs resolved by longest prefix
//! - In-memory or persistent (redb) cache backends
//! - Provenance on every response: fresh or cached
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use api_gatekeeper::cache::CacheConfig;
//! use api_gatekeeper::gate::{RequestDescriptor, RequestGate};
//! use api_gatekeeper::rate_limit::RateLimit;
//! use api_gatekeeper::transport::HttpTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::builder()
//!         .base_url("https://{region}.api.riotgames.com")
//!         .build()?;
//!     let gate = RequestGate::builder(transport)
//!         .cache_config(CacheConfig::smart_memory())
//!         .rate_limits(vec![RateLimit::per_second(20)?, RateLimit::per_minutes(100, 2)?])
//!         .build()?;
//!
//!     let request = RequestDescriptor::get("/lol/status/v4/platform-data").region("euw1");
//!     let response = gate.execute(&request).await?;
//!     println!("{} bytes, cached: {}", response.payload.len(), response.from_cache());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod gate;
pub mod rate_limit;
pub mod transport;

// Re-export commonly used types at crate root
pub use error::{ApiError, CacheError, GateError};
pub use gate::{GateResponse, Provenance, RequestDescriptor, RequestGate};

/// Result type alias using GateError
pub type Result<T> = std::result::Result<T, GateError>;
