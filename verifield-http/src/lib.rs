//! HTTP transport for verifield lookups
//!
//! Performs lookup requests as plain `GET`s with reqwest and hands the JSON
//! body back to the lookup coordinator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;
use verifield::error::TransportError;
use verifield::lookup::{LookupRequest, Transport};

const DEFAULT_USER_AGENT: &str = concat!("verifield/", env!("CARGO_PKG_VERSION"));

/// Lookup transport over HTTP.
///
/// Cheap to clone (uses `Arc` internally); one transport can serve every
/// field of every session.
///
/// # Example
///
/// ```ignore
/// use verifield_http::HttpTransport;
///
/// let transport = HttpTransport::builder()
///     .timeout(Duration::from_secs(5))
///     .build()?;
///
/// let session = FormSession::new(settings).with_transport(transport);
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    http_client: Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a new builder for constructing a transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    /// Per-request timeout applied by this transport, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    async fn get(&self, url: Url) -> Result<serde_json::Value, TransportError> {
        let mut request = self.inner.http_client.get(url);
        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        if !status.is_success() {
            return Err(TransportError::http(status.as_u16(), body));
        }

        serde_json::from_str(&body)
            .map_err(|e| TransportError::parse_with_body(e.to_string(), body))
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.inner.timeout.unwrap_or_default())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform_lookup(
        &self,
        request: &LookupRequest,
    ) -> Result<serde_json::Value, TransportError> {
        let url = Url::parse(&request.url())
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url(), e)))?;

        log::debug!(
            "GET {} (lookup #{} for '{}')",
            url,
            request.generation,
            request.field
        );
        let result = self.get(url).await;
        if let Err(err) = &result {
            log::debug!("Lookup #{} transport error: {}", request.generation, err);
        }
        result
    }
}

/// Builder for constructing an [`HttpTransport`].
///
/// # Example
///
/// ```ignore
/// let transport = HttpTransport::builder()
///     .timeout(Duration::from_secs(5))
///     .connect_timeout(Duration::from_secs(2))
///     .user_agent("my-form/1.0")
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct HttpTransportBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    http_client: Option<Client>,
}

impl HttpTransportBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout.
    ///
    /// The lookup coordinator enforces its own deadline as well; whichever
    /// is shorter wins.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the `User-Agent` header.
    ///
    /// This is applied when building the HTTP client.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a default client will be created. Connection settings of
    /// this builder are ignored for a custom client.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the [`HttpTransport`].
    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder().user_agent(
                    self.user_agent
                        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                );
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder
                    .build()
                    .map_err(|e| TransportError::Network(e.to_string()))?
            }
        };

        Ok(HttpTransport {
            inner: Arc::new(HttpTransportInner {
                http_client,
                timeout: self.timeout,
            }),
        })
    }
}
