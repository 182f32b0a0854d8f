//! Single-flight credential refresh.
//!
//! The anti-forgery token and session id expire well before the login
//! cookies do. When concurrent calls all hit the expiry at once, exactly
//! one of them may re-fetch the landing page: hammering the login
//! surface from many tasks trips abuse heuristics and risks conflicting
//! partial writes. The coordinator runs at most one refresh at a time;
//! every other caller awaits the shared ticket and reuses its outcome.

use crate::auth::Credentials;
use crate::config::NetworkConfig;
use crate::transport::HttpTransport;
use crate::{Result, RpcError};
use regex::Regex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Pattern for the anti-forgery token embedded in the landing page's
/// inline script state.
const CSRF_PATTERN: &str = r#""SNlM0e"\s*:\s*"([^"]+)""#;

/// Pattern for the session id, same embedding.
const SESSION_ID_PATTERN: &str = r#""FdrFJe"\s*:\s*"([^"]+)""#;

fn csrf_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CSRF_PATTERN).expect("static pattern compiles"))
}

fn session_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SESSION_ID_PATTERN).expect("static pattern compiles"))
}

/// Why a refresh was requested; carried into logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// A call observed an auth failure.
    AuthFailure,
    /// A caller independently detected staleness.
    Explicit,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshReason::AuthFailure => write!(f, "auth-failure"),
            RefreshReason::Explicit => write!(f, "explicit"),
        }
    }
}

/// Session credential state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Credentials were accepted last time they were used.
    Valid,
    /// A refresh is in flight.
    Refreshing,
    /// The last refresh hit the login surface; only interactive re-login
    /// can recover.
    Stale,
}

/// Cloneable refresh failure shared with every waiter on the ticket.
#[derive(Debug, Clone)]
struct RefreshFailure {
    relogin_required: bool,
    message: String,
}

impl RefreshFailure {
    fn into_rpc(self) -> RpcError {
        if self.relogin_required {
            RpcError::ReloginRequired {
                message: self.message,
            }
        } else {
            RpcError::AuthExpired {
                message: format!("credential refresh failed: {}", self.message),
            }
        }
    }
}

type RefreshOutcome = std::result::Result<Arc<Credentials>, RefreshFailure>;

/// Owns the credential set and serializes refreshes.
pub struct RefreshCoordinator {
    http: Arc<dyn HttpTransport>,
    landing_url: String,
    settle_delay: Duration,
    current: RwLock<Arc<Credentials>>,
    /// The in-flight ticket. Present while a refresh runs; taken (and the
    /// outcome broadcast) when it resolves, so the next need mints a new
    /// ticket.
    inflight: Mutex<Option<broadcast::Sender<RefreshOutcome>>>,
    stale: AtomicBool,
}

impl RefreshCoordinator {
    pub fn new(http: Arc<dyn HttpTransport>, initial: Credentials, landing_url: String) -> Self {
        Self {
            http,
            landing_url,
            settle_delay: NetworkConfig::REFRESH_SETTLE_DELAY,
            current: RwLock::new(Arc::new(initial)),
            inflight: Mutex::new(None),
            stale: AtomicBool::new(false),
        }
    }

    /// Override the settling delay (tests use a short one).
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Immutable snapshot of the current credential set. Calls take a
    /// snapshot at send time; a refresh completing mid-flight only
    /// affects calls issued afterwards.
    pub async fn snapshot(&self) -> Arc<Credentials> {
        self.current.read().await.clone()
    }

    pub async fn state(&self) -> SessionState {
        if self.inflight.lock().await.is_some() {
            SessionState::Refreshing
        } else if self.stale.load(Ordering::SeqCst) {
            SessionState::Stale
        } else {
            SessionState::Valid
        }
    }

    /// Run a refresh, or join the one already in flight.
    ///
    /// All concurrent callers resolve with the same outcome. On success
    /// the new credential set is already installed when this returns.
    pub async fn get_or_refresh(&self, reason: RefreshReason) -> Result<Arc<Credentials>> {
        let joined = {
            let mut inflight = self.inflight.lock().await;
            match inflight.as_ref() {
                Some(ticket) => Some(ticket.subscribe()),
                None => {
                    let (ticket, _) = broadcast::channel(1);
                    *inflight = Some(ticket);
                    None
                }
            }
        };

        if let Some(mut rx) = joined {
            debug!(%reason, "Joining in-flight credential refresh");
            return match rx.recv().await {
                Ok(outcome) => outcome.map_err(RefreshFailure::into_rpc),
                Err(_) => Err(RpcError::AuthExpired {
                    message: "credential refresh was interrupted".to_string(),
                }),
            };
        }

        info!(%reason, "Refreshing session credentials");
        let outcome = self.run_refresh().await;

        // Settle before releasing anyone: re-calling the RPC surface in
        // the same instant the tokens rotate re-triggers the failure.
        tokio::time::sleep(self.settle_delay).await;

        let mut inflight = self.inflight.lock().await;
        if let Some(ticket) = inflight.take() {
            // No waiters is fine; send only fails when nobody subscribed.
            let _ = ticket.send(outcome.clone());
        }
        drop(inflight);

        outcome.map_err(RefreshFailure::into_rpc)
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let current = self.current.read().await.clone();
        let headers = vec![("Cookie".to_string(), current.cookie_header())];

        let response = self
            .http
            .get(&self.landing_url, &headers)
            .await
            .map_err(|e| RefreshFailure {
                relogin_required: false,
                message: format!("landing page fetch failed: {e}"),
            })?;

        if is_login_redirect(&response.final_url) {
            self.stale.store(true, Ordering::SeqCst);
            warn!(final_url = %response.final_url, "Refresh redirected to login page; session is stale");
            return Err(RefreshFailure {
                relogin_required: true,
                message: format!("redirected to login page: {}", response.final_url),
            });
        }

        if !(200..300).contains(&response.status) {
            return Err(RefreshFailure {
                relogin_required: false,
                message: format!("landing page returned HTTP {}", response.status),
            });
        }

        let csrf_token = match extract_token(csrf_regex(), &response.body) {
            Some(token) => token,
            None => return Err(self.missing_token_failure("anti-forgery token (SNlM0e)")),
        };
        let session_id = match extract_token(session_id_regex(), &response.body) {
            Some(id) => id,
            None => return Err(self.missing_token_failure("session id (FdrFJe)")),
        };

        // Cookies are kept; only the short-lived tokens rotate. The swap
        // is atomic: either the complete new set lands or nothing does.
        let refreshed = Arc::new(current.with_tokens(csrf_token, session_id));
        *self.current.write().await = refreshed.clone();
        self.stale.store(false, Ordering::SeqCst);
        info!("Session credentials refreshed");

        Ok(refreshed)
    }

    fn missing_token_failure(&self, what: &str) -> RefreshFailure {
        // The page served but without its inline state: either the page
        // structure changed or the session no longer gets the app shell.
        self.stale.store(true, Ordering::SeqCst);
        RefreshFailure {
            relogin_required: true,
            message: format!("{what} not found in landing page"),
        }
    }
}

/// Whether a URL points at the Google login surface.
pub fn is_login_redirect(url: &str) -> bool {
    url.contains("accounts.google.") || url.contains("ServiceLogin") || url.contains("/signin")
}

fn extract_token(re: &Regex, html: &str) -> Option<String> {
    re.captures(html).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::WireResponse;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    const LANDING_HTML: &str =
        r#"<script>window.WIZ_global_data = {"SNlM0e":"fresh_csrf","FdrFJe":"fresh_sid"};</script>"#;

    struct FakeLanding {
        gets: AtomicU32,
        final_url: String,
        body: String,
    }

    impl FakeLanding {
        fn new(body: &str) -> Self {
            Self {
                gets: AtomicU32::new(0),
                final_url: "https://notebooklm.google.com/".to_string(),
                body: body.to_string(),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for FakeLanding {
        async fn post_form(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            _body: String,
        ) -> Result<WireResponse> {
            unreachable!("refresh never posts")
        }

        async fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<WireResponse> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            // Widen the race window so every concurrent caller observes
            // the in-flight ticket.
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(WireResponse {
                status: 200,
                final_url: self.final_url.clone(),
                retry_after: None,
                body: self.body.clone(),
            })
        }
    }

    fn initial_credentials() -> Credentials {
        Credentials::from_pairs([("SID", "sid_value")], "old_csrf", "old_sid")
    }

    fn coordinator(http: Arc<FakeLanding>) -> RefreshCoordinator {
        RefreshCoordinator::new(
            http,
            initial_credentials(),
            "https://notebooklm.google.com/".to_string(),
        )
        .with_settle_delay(Duration::from_millis(10))
    }

    #[test]
    fn test_token_extraction() {
        assert_eq!(
            extract_token(csrf_regex(), LANDING_HTML).as_deref(),
            Some("fresh_csrf")
        );
        assert_eq!(
            extract_token(session_id_regex(), LANDING_HTML).as_deref(),
            Some("fresh_sid")
        );
        // Spaced variant also embeds in the wild.
        let spaced = r#"{"SNlM0e": "tok", "FdrFJe": "sid"}"#;
        assert_eq!(extract_token(csrf_regex(), spaced).as_deref(), Some("tok"));
    }

    #[test]
    fn test_login_redirect_detection() {
        assert!(is_login_redirect(
            "https://accounts.google.com/v3/signin/identifier?continue=x"
        ));
        assert!(is_login_redirect("https://www.google.com/a/ServiceLogin"));
        assert!(!is_login_redirect("https://notebooklm.google.com/"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_rotates_tokens_and_keeps_cookies() {
        let http = Arc::new(FakeLanding::new(LANDING_HTML));
        let coordinator = coordinator(http.clone());

        let refreshed = coordinator
            .get_or_refresh(RefreshReason::Explicit)
            .await
            .unwrap();

        assert_eq!(refreshed.csrf_token, "fresh_csrf");
        assert_eq!(refreshed.session_id, "fresh_sid");
        assert!(refreshed.has_cookie("SID"));
        assert_eq!(coordinator.state().await, SessionState::Valid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_share_one_fetch() {
        let http = Arc::new(FakeLanding::new(LANDING_HTML));
        let coordinator = Arc::new(coordinator(http.clone()));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let coordinator = coordinator.clone();
                async move { coordinator.get_or_refresh(RefreshReason::AuthFailure).await }
            })
            .collect();
        let outcomes = futures::future::join_all(tasks).await;

        assert_eq!(http.gets.load(Ordering::SeqCst), 1);
        for outcome in outcomes {
            assert_eq!(outcome.unwrap().csrf_token, "fresh_csrf");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_redirect_marks_stale() {
        let http = Arc::new(FakeLanding {
            gets: AtomicU32::new(0),
            final_url: "https://accounts.google.com/v3/signin/identifier".to_string(),
            body: String::new(),
        });
        let coordinator = coordinator(http);

        let err = coordinator
            .get_or_refresh(RefreshReason::AuthFailure)
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::ReloginRequired { .. }));
        assert_eq!(coordinator.state().await, SessionState::Stale);
        // The previous set stays installed untouched.
        assert_eq!(coordinator.snapshot().await.csrf_token, "old_csrf");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_tokens_mark_stale() {
        let http = Arc::new(FakeLanding::new("<html>no inline state</html>"));
        let coordinator = coordinator(http);

        let err = coordinator
            .get_or_refresh(RefreshReason::Explicit)
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::ReloginRequired { .. }));
        assert_eq!(coordinator.state().await, SessionState::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_need_mints_a_new_ticket() {
        let http = Arc::new(FakeLanding::new(LANDING_HTML));
        let coordinator = coordinator(http.clone());

        coordinator
            .get_or_refresh(RefreshReason::AuthFailure)
            .await
            .unwrap();
        coordinator
            .get_or_refresh(RefreshReason::AuthFailure)
            .await
            .unwrap();

        // Sequential needs each run their own refresh.
        assert_eq!(http.gets.load(Ordering::SeqCst), 2);
    }
}
