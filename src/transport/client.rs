//! Network transport backed by the hyper client

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use super::body::buffer_response;
use super::Transport;
use crate::config::{LimitsConfig, NetworkConfig};
use crate::{Error, Result};

/// Real network transport used as the delegate of Record and Cache modes
///
/// Speaks plain HTTP/1.1 over a pooled connection. Each exchange, including
/// reading the response body, is bounded by the configured timeout; dropping
/// the returned future cancels the exchange.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
    max_response_size: usize,
}

impl HyperTransport {
    /// Create a transport with default network settings
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&NetworkConfig::default(), &LimitsConfig::default())
    }

    /// Create a transport from configuration
    #[must_use]
    pub fn with_config(network: &NetworkConfig, limits: &LimitsConfig) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(network.pool_idle_timeout_secs))
            .pool_max_idle_per_host(network.pool_max_idle_per_host)
            .build_http();

        Self {
            client,
            timeout: Duration::from_millis(network.timeout_ms),
            max_response_size: limits.max_response_size,
        }
    }

    async fn exchange(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let (parts, body) = request.into_parts();
        let request = Request::from_parts(parts, Full::new(body));

        let response = self.client.request(request).await.map_err(|e| {
            warn!("Request failed: {e}");
            Error::Transport(format!("Request failed: {e}"))
        })?;

        buffer_response(response, self.max_response_size).await
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        debug!("Sending {} {}", request.method(), request.uri());

        if request.uri().scheme().is_none() || request.uri().authority().is_none() {
            return Err(Error::Transport(format!(
                "Request URI '{}' must be absolute",
                request.uri()
            )));
        }

        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }
}
