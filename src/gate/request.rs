//! Request descriptors and tagged responses.

use reqwest::Method;

use crate::cache::CacheKey;
use crate::error::GateError;

/// Identity of one logical upstream request.
///
/// # Example
///
/// ```rust
/// use api_gatekeeper::gate::RequestDescriptor;
///
/// let request = RequestDescriptor::get("/lol/match/v5/matches/by-puuid/abc/ids")
///     .param("count", "5")
///     .region("EUROPE");
///
/// assert_eq!(request.region_name(), Some("europe"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    region: Option<String>,
}

impl RequestDescriptor {
    /// Create a descriptor for any method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            region: None,
        }
    }

    /// Create a GET descriptor.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Add a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Add an optional query parameter, skipping `None`.
    pub fn param_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    /// Set the region (routing host) of the request. Stored lower-cased.
    pub fn region(mut self, region: impl AsRef<str>) -> Self {
        self.region = Some(region.as_ref().to_ascii_lowercase());
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path as given, including any embedded query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path without its query string, used for policy resolution.
    pub fn endpoint(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(p, _)| p)
    }

    /// Explicit query parameters, in insertion order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Lower-cased region, if any.
    pub fn region_name(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Cache key identifying this request.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(&self.path, &self.params, self.region.as_deref())
    }

    /// Whether responses to this method may be served from cache.
    pub fn is_cacheable_method(&self) -> bool {
        self.method == Method::GET
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Fetched from the upstream API by this call.
    Fresh,
    /// Served from the cache without touching the rate limiter.
    Cached,
}

/// A response payload tagged with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResponse {
    /// Opaque response body.
    pub payload: Vec<u8>,
    /// Fresh or cached.
    pub provenance: Provenance,
}

impl GateResponse {
    pub(crate) fn fresh(payload: Vec<u8>) -> Self {
        Self {
            payload,
            provenance: Provenance::Fresh,
        }
    }

    pub(crate) fn cached(payload: Vec<u8>) -> Self {
        Self {
            payload,
            provenance: Provenance::Cached,
        }
    }

    /// Whether the payload was served from cache.
    pub fn from_cache(&self) -> bool {
        self.provenance == Provenance::Cached
    }

    /// Deserialize the payload as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, GateError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}
