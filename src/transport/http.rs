//! HTTP transport built on reqwest with tracing middleware.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use url::Url;

use crate::error::{ApiError, GateError};
use crate::gate::RequestDescriptor;
use crate::transport::Transport;

/// Placeholder in a base URL replaced by the request's region.
pub const REGION_PLACEHOLDER: &str = "{region}";

/// Upstream HTTP transport.
///
/// The base URL may contain `{region}`, which is substituted with the
/// descriptor's region so one transport can serve regional hosts:
///
/// ```rust,no_run
/// use api_gatekeeper::transport::HttpTransport;
///
/// let transport = HttpTransport::builder()
///     .base_url("https://{region}.api.riotgames.com")
///     .default_header("X-Riot-Token", "RGAPI-...")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    http_client: ClientWithMiddleware,
    base_url: String,
}

impl HttpTransport {
    /// Create a new transport builder.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    /// The configured base URL, placeholder included.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full URL for a request.
    pub fn url_for(&self, request: &RequestDescriptor) -> Result<Url, GateError> {
        let base = if self.base_url.contains(REGION_PLACEHOLDER) {
            let region = request.region_name().ok_or_else(|| {
                GateError::config(format!(
                    "request to {} needs a region for base URL {}",
                    request.path(),
                    self.base_url
                ))
            })?;
            self.base_url.replace(REGION_PLACEHOLDER, region)
        } else {
            self.base_url.clone()
        };

        let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), request.path()))?;
        if !request.params().is_empty() {
            url.query_pairs_mut().extend_pairs(request.params());
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Vec<u8>, GateError> {
        let url = self.url_for(request)?;
        let response = self
            .http_client
            .request(request.method().clone(), url)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(GateError::Api(ApiError::from_body(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            )));
        }
        Ok(body.to_vec())
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for [`HttpTransport`].
pub struct HttpTransportBuilder {
    base_url: Option<String>,
    headers: Vec<(String, String)>,
    user_agent: Option<String>,
    timeout: Duration,
}

impl HttpTransportBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            headers: Vec::new(),
            user_agent: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the base URL, optionally containing `{region}`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Send a header with every request.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the transport.
    ///
    /// Fails when no base URL is set or a header is not valid HTTP.
    pub fn build(self) -> Result<HttpTransport, GateError> {
        let base_url = self
            .base_url
            .ok_or_else(|| GateError::config("HTTP transport needs a base URL"))?;

        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("api-gatekeeper/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("api-gatekeeper"));
        headers.insert(USER_AGENT, header_value);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GateError::config(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| GateError::config(format!("invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()?;

        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(HttpTransport {
            http_client: client,
            base_url,
        })
    }
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::builder().base_url(base).build().unwrap()
    }

    #[test]
    fn test_url_substitutes_region() {
        let transport = transport("https://{region}.api.example.com");
        let request = RequestDescriptor::get("/lol/status").region("EUW1");
        let url = transport.url_for(&request).unwrap();
        assert_eq!(url.as_str(), "https://euw1.api.example.com/lol/status");
    }

    #[test]
    fn test_url_requires_region_for_placeholder() {
        let transport = transport("https://{region}.api.example.com");
        let err = transport.url_for(&RequestDescriptor::get("/a")).unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[test]
    fn test_url_appends_params_to_embedded_query() {
        let transport = transport("http://localhost:8080/");
        let request = RequestDescriptor::get("/ids?start=0").param("count", 5);
        let url = transport.url_for(&request).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/ids?start=0&count=5");
    }

    #[test]
    fn test_build_requires_base_url() {
        assert!(HttpTransport::builder().build().is_err());
    }

    #[test]
    fn test_build_rejects_bad_header() {
        let result = HttpTransport::builder()
            .base_url("http://localhost")
            .default_header("bad header", "x")
            .build();
        assert!(result.is_err());
    }
}
