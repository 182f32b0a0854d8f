//! HTTP seam between the transport and the network.
//!
//! The orchestration layer only needs form POSTs and header-controlled
//! GETs; putting that behind a trait keeps the wire logic testable
//! against an in-memory backend. Production uses the reqwest-backed
//! implementation.

use crate::config::{NetworkConfig, ServiceConfig};
use crate::{Result, RpcError};
use async_trait::async_trait;
use reqwest::header;

/// What the transport needs back from one HTTP exchange.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    /// URL after redirects; used to detect bounces to the login surface.
    pub final_url: String,
    /// Parsed `Retry-After` header, when the server sent one.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP operations the transport consumes.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a form-encoded body.
    async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<WireResponse>;

    /// GET with custom headers, following redirects.
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<WireResponse>;
}

/// Production transport backed by reqwest's pooled client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(ServiceConfig::USER_AGENT)
            .build()
            .map_err(|e| RpcError::Network {
                message: format!("failed to create HTTP client: {e}"),
                cause: None,
            })?;
        Ok(Self { client })
    }

    async fn read_response(response: reqwest::Response) -> Result<WireResponse> {
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let body = response.text().await.map_err(|e| RpcError::Network {
            message: format!("failed to read response body: {e}"),
            cause: Some(e.to_string()),
        })?;
        Ok(WireResponse {
            status,
            final_url,
            retry_after,
            body,
        })
    }

    fn network_error(url: &str, verb: &str, e: reqwest::Error) -> RpcError {
        RpcError::Network {
            message: format!("{verb} {url} failed: {e}"),
            cause: std::error::Error::source(&e).map(|s| s.to_string()),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<WireResponse> {
        let mut request = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded;charset=UTF-8")
            .body(body);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| Self::network_error(url, "POST", e))?;
        Self::read_response(response).await
    }

    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<WireResponse> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| Self::network_error(url, "GET", e))?;
        Self::read_response(response).await
    }
}
