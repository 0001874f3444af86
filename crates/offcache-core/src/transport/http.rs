//! HTTP transport backed by `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;

use super::Transport;
use crate::error::{TransportError, TransportResult};
use crate::request::ResourceRequest;
use crate::response::Response;

/// Transport over the real network.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// No request timeout is configured: a hung fetch stays pending until the
    /// caller drops it.
    pub fn new() -> TransportResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &ResourceRequest) -> TransportResult<Response> {
        let method = Method::from_bytes(request.method().as_bytes()).map_err(|e| {
            TransportError::InvalidRequest {
                message: format!("invalid method {}: {}", request.method(), e),
            }
        })?;

        let mut builder = self.client.request(method, request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url(), status, bytes = body.len(), "Network fetch complete");
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
