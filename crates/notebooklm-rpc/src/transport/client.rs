//! Transport orchestration: one logical RPC call from encode to result.
//!
//! `RpcClient` owns the session context (the sequence counter, the
//! credential store behind its refresh coordinator, and the drift
//! tracker) as one explicit object. Nothing here is a process-wide
//! singleton; two clients are two independent sessions.

use crate::auth::{is_login_redirect, Credentials, RefreshCoordinator, RefreshReason, SessionState};
use crate::config::{NetworkConfig, ServiceConfig};
use crate::protocol::{decode_response, encode, request_url, DecodedResult, DriftTracker, ParamValue, RpcMethod};
use crate::transport::http::{HttpTransport, ReqwestTransport, WireResponse};
use crate::transport::retry::RetryPolicy;
use crate::{Result, RpcError};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Per-call timeout for the network exchange. Cancels only the
    /// in-flight request, never a refresh the call is waiting on.
    /// Defaults to `NetworkConfig::REQUEST_TIMEOUT`.
    pub timeout: Option<Duration>,
    /// Retry behavior for this call.
    pub retry: RetryPolicy,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Builder for `RpcClient`.
pub struct RpcClientBuilder {
    credentials: Credentials,
    http: Option<Arc<dyn HttpTransport>>,
    endpoint: String,
    landing_url: String,
    settle_delay: Option<Duration>,
}

impl RpcClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            http: None,
            endpoint: ServiceConfig::BATCHEXECUTE_URL.to_string(),
            landing_url: ServiceConfig::LANDING_URL.to_string(),
            settle_delay: None,
        }
    }

    /// Substitute the HTTP implementation (tests use an in-memory one).
    pub fn with_http_transport(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_landing_url(mut self, url: impl Into<String>) -> Self {
        self.landing_url = url.into();
        self
    }

    /// Override the refresh settling delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    pub fn build(self) -> Result<RpcClient> {
        let http: Arc<dyn HttpTransport> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let mut coordinator =
            RefreshCoordinator::new(http.clone(), self.credentials, self.landing_url);
        if let Some(delay) = self.settle_delay {
            coordinator = coordinator.with_settle_delay(delay);
        }
        Ok(RpcClient {
            http,
            auth: Arc::new(coordinator),
            drift: Arc::new(DriftTracker::new()),
            sequence: AtomicU64::new(1),
            endpoint: self.endpoint,
        })
    }
}

/// The RPC transport engine.
pub struct RpcClient {
    http: Arc<dyn HttpTransport>,
    auth: Arc<RefreshCoordinator>,
    drift: Arc<DriftTracker>,
    /// Session-lifetime request counter. One mutation point; strictly
    /// increasing; a number is consumed per physical send and never
    /// reused, since the service rejects duplicates.
    sequence: AtomicU64,
    endpoint: String,
}

impl RpcClient {
    pub fn builder(credentials: Credentials) -> RpcClientBuilder {
        RpcClientBuilder::new(credentials)
    }

    /// Issue one logical RPC call.
    ///
    /// Returns the decoded result tree; an empty-but-present result comes
    /// back as `Value::Null`, which is not an error. The only automatic
    /// recovery is one refresh-then-retry after an expired token;
    /// throttling retries happen per the call's retry policy; every other
    /// failure surfaces typed.
    pub async fn issue(
        &self,
        method: RpcMethod,
        params: ParamValue,
        options: CallOptions,
    ) -> Result<Value> {
        let timeout = options.timeout.unwrap_or(NetworkConfig::REQUEST_TIMEOUT);
        let mut rate_limit_attempt = 0u32;
        let mut auth_attempt = 0u32;

        loop {
            let err = match self.send_once(method, &params, timeout).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let attempt = match &err {
                RpcError::AuthExpired { .. } => auth_attempt,
                RpcError::RateLimited { .. } => rate_limit_attempt,
                _ => return Err(err),
            };
            let Some(delay) = options.retry.should_retry(attempt, &err) else {
                return Err(err);
            };

            match &err {
                RpcError::AuthExpired { .. } => {
                    auth_attempt += 1;
                    debug!(method = %method, "Auth expired; refreshing credentials before retry");
                    // A failed refresh is terminal for the call.
                    self.auth.get_or_refresh(RefreshReason::AuthFailure).await?;
                }
                RpcError::RateLimited { .. } => {
                    rate_limit_attempt += 1;
                    warn!(
                        method = %method,
                        attempt = rate_limit_attempt,
                        "Rate limited; retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => unreachable!("only retryable errors reach here"),
            }
        }
    }

    /// Refresh session credentials, or join a refresh already in flight.
    /// For callers that detect staleness independently of a failed call.
    pub async fn refresh(&self, reason: RefreshReason) -> Result<Arc<Credentials>> {
        self.auth.get_or_refresh(reason).await
    }

    /// Snapshot of the current credential set.
    pub async fn credentials(&self) -> Arc<Credentials> {
        self.auth.snapshot().await
    }

    pub async fn session_state(&self) -> SessionState {
        self.auth.state().await
    }

    /// Drift observations collected so far, for health monitoring.
    pub fn drift_tracker(&self) -> &DriftTracker {
        &self.drift
    }

    /// One physical send: encode, POST, classify, decode. Consumes
    /// exactly one sequence number.
    async fn send_once(
        &self,
        method: RpcMethod,
        params: &ParamValue,
        timeout: Duration,
    ) -> Result<Value> {
        // Snapshot at send time: a refresh completing mid-flight must not
        // touch a request that is already on the wire.
        let credentials = self.auth.snapshot().await;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let envelope = encode(method, params, sequence, Some(&credentials.csrf_token))?;
        let url = request_url(&self.endpoint, method, &credentials.session_id, sequence)?;
        let headers = vec![
            ("Cookie".to_string(), credentials.cookie_header()),
            ("x-same-domain".to_string(), "1".to_string()),
        ];

        debug!(method = %method, sequence, "Issuing RPC call");
        let send = self.http.post_form(&url, &headers, envelope.form_body);
        let response = match tokio::time::timeout(timeout, send).await {
            Ok(result) => result?,
            Err(_) => return Err(RpcError::Timeout(timeout)),
        };

        self.classify(&response)?;

        let decoded = decode_response(&response.body, method.id())?;
        for id in &decoded.unrequested {
            self.drift.note_unrequested(id);
        }
        match decoded.result {
            DecodedResult::Value(value) => Ok(value),
            DecodedResult::Empty => Ok(Value::Null),
            DecodedResult::NotFound => {
                // No error signal and no frame: protocol drift, not a
                // server failure. Fatal for the call, diagnosed once.
                self.drift.note_missing(method.id());
                Err(RpcError::UnknownRpcMethod {
                    id: method.id().to_string(),
                    name: method.name().to_string(),
                })
            }
        }
    }

    /// Map transport-level failure signals onto the error taxonomy.
    fn classify(&self, response: &WireResponse) -> Result<()> {
        if is_login_redirect(&response.final_url) {
            return Err(RpcError::AuthExpired {
                message: format!("redirected to login page: {}", response.final_url),
            });
        }
        match response.status {
            200..=299 => Ok(()),
            401 | 403 => Err(RpcError::AuthExpired {
                message: format!("HTTP {}", response.status),
            }),
            429 => Err(RpcError::RateLimited {
                retry_after_secs: response.retry_after,
            }),
            code => Err(RpcError::Server {
                code,
                message: snippet(&response.body),
            }),
        }
    }
}

/// First line of a body, bounded, for error messages.
fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let line = body.lines().next().unwrap_or("");
    if line.chars().count() > MAX {
        let truncated: String = line.chars().take(MAX).collect();
        format!("{truncated}…")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_bounds_long_bodies() {
        let long = "x".repeat(500);
        assert!(snippet(&long).len() <= 210);
        assert_eq!(snippet("short body"), "short body");
        assert_eq!(snippet(""), "");
    }

    #[test]
    fn test_classify_statuses() {
        let client_err = |status: u16, retry_after: Option<u64>| WireResponse {
            status,
            final_url: "https://notebooklm.google.com/_/batchexecute".to_string(),
            retry_after,
            body: String::new(),
        };
        let credentials = Credentials::from_pairs([("SID", "x")], "c", "s");
        let client = RpcClient::builder(credentials)
            .with_http_transport(Arc::new(NeverTransport))
            .build()
            .unwrap();

        assert!(client.classify(&client_err(200, None)).is_ok());
        assert!(matches!(
            client.classify(&client_err(401, None)).unwrap_err(),
            RpcError::AuthExpired { .. }
        ));
        assert!(matches!(
            client.classify(&client_err(403, None)).unwrap_err(),
            RpcError::AuthExpired { .. }
        ));
        assert!(matches!(
            client.classify(&client_err(429, Some(9))).unwrap_err(),
            RpcError::RateLimited {
                retry_after_secs: Some(9)
            }
        ));
        assert!(matches!(
            client.classify(&client_err(500, None)).unwrap_err(),
            RpcError::Server { code: 500, .. }
        ));
    }

    #[test]
    fn test_classify_login_redirect_is_auth_expired() {
        let credentials = Credentials::from_pairs([("SID", "x")], "c", "s");
        let client = RpcClient::builder(credentials)
            .with_http_transport(Arc::new(NeverTransport))
            .build()
            .unwrap();
        let response = WireResponse {
            status: 200,
            final_url: "https://accounts.google.com/v3/signin/identifier".to_string(),
            retry_after: None,
            body: String::new(),
        };
        assert!(matches!(
            client.classify(&response).unwrap_err(),
            RpcError::AuthExpired { .. }
        ));
    }

    /// Transport for tests that never performs I/O.
    struct NeverTransport;

    #[async_trait::async_trait]
    impl HttpTransport for NeverTransport {
        async fn post_form(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _body: String,
        ) -> Result<WireResponse> {
            unreachable!("no I/O in these tests")
        }

        async fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<WireResponse> {
            unreachable!("no I/O in these tests")
        }
    }
}
