//! Transports perform the actual upstream call.
//!
//! The gate depends only on the [`Transport`] trait. [`HttpTransport`] is the
//! reqwest-based implementation; tests and alternative clients can supply
//! their own.
//!
//! # Example
//!
//! ```rust
//! use api_gatekeeper::gate::RequestDescriptor;
//! use api_gatekeeper::transport::Transport;
//! use api_gatekeeper::GateError;
//!
//! struct Canned;
//!
//! impl Transport for Canned {
//!     async fn fetch(&self, _request: &RequestDescriptor) -> Result<Vec<u8>, GateError> {
//!         Ok(b"{}".to_vec())
//!     }
//! }
//! ```

mod http;

pub use http::{HttpTransport, HttpTransportBuilder};

use std::future::Future;
use std::sync::Arc;

use crate::error::GateError;
use crate::gate::RequestDescriptor;

/// Performs an upstream request and returns the raw response body.
///
/// Errors are passed through the gate unchanged.
pub trait Transport: Send + Sync {
    /// Execute `request` against the upstream API.
    fn fetch(
        &self,
        request: &RequestDescriptor,
    ) -> impl Future<Output = Result<Vec<u8>, GateError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Vec<u8>, GateError> {
        self.as_ref().fetch(request).await
    }
}
