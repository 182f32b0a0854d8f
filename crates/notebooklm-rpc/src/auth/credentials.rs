//! Session credentials for authenticated RPC calls.
//!
//! Three pieces travel with every call: the Google login cookies (long
//! lived, produced by the interactive login flow), the anti-forgery token
//! (`SNlM0e`, sent in the `at` form field), and the session id (`FdrFJe`,
//! sent in the `f.sid` query parameter). The latter two are short lived
//! and refreshed from the landing page independently of the cookies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum cookie required for the service to accept a call at all.
pub const REQUIRED_COOKIE: &str = "SID";

/// One cookie with the domain it was issued for. Domains matter when
/// following redirects across Google hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub value: String,
    pub domain: String,
}

/// A complete credential set.
///
/// Owned by the refresh coordinator and handed out as immutable
/// snapshots; a refresh either installs a complete new set or leaves the
/// old one untouched. Serializable so login bootstrap tooling can persist
/// and reload a set between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    cookies: BTreeMap<String, Cookie>,
    /// Anti-forgery token (`SNlM0e`).
    pub csrf_token: String,
    /// Session id (`FdrFJe`).
    pub session_id: String,
    /// When this set was issued or last refreshed.
    pub issued_at: DateTime<Utc>,
}

impl Credentials {
    pub fn new(
        cookies: BTreeMap<String, Cookie>,
        csrf_token: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            cookies,
            csrf_token: csrf_token.into(),
            session_id: session_id.into(),
            issued_at: Utc::now(),
        }
    }

    /// Convenience constructor from bare name/value pairs, for call sites
    /// that load cookies without domain information.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
        csrf_token: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        let cookies = pairs
            .into_iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    Cookie {
                        value: value.to_string(),
                        domain: ".google.com".to_string(),
                    },
                )
            })
            .collect();
        Self::new(cookies, csrf_token, session_id)
    }

    /// Build a new set with the same cookies but fresh tokens. Used by the
    /// refresh coordinator, which rotates tokens without touching cookies.
    pub fn with_tokens(&self, csrf_token: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            cookies: self.cookies.clone(),
            csrf_token: csrf_token.into(),
            session_id: session_id.into(),
            issued_at: Utc::now(),
        }
    }

    /// Semicolon-separated `Cookie` header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, cookie)| format!("{}={}", name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Whether the set carries the cookie the service requires.
    pub fn has_required_cookies(&self) -> bool {
        self.has_cookie(REQUIRED_COOKIE)
    }

    pub fn cookies(&self) -> &BTreeMap<String, Cookie> {
        &self.cookies
    }
}
