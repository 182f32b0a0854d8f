//! Centralized configuration for the RPC transport.
//!
//! This module provides configuration constants for the remote service
//! endpoints, network timeouts, retry behavior, and credential refresh.

use std::time::Duration;

/// Remote service endpoints and wire-protocol constants.
pub struct ServiceConfig;

impl ServiceConfig {
    /// The single batchexecute POST endpoint all RPC calls go through.
    pub const BATCHEXECUTE_URL: &'static str =
        "https://notebooklm.google.com/_/LabsTailwindUi/data/batchexecute";

    /// Landing page fetched during credential refresh; the anti-forgery
    /// token and session id are embedded in its inline script state.
    pub const LANDING_URL: &'static str = "https://notebooklm.google.com/";

    /// `source-path` query parameter sent with every call.
    pub const SOURCE_PATH: &'static str = "/";

    /// Trailing marker of the request envelope.
    pub const ENVELOPE_KIND: &'static str = "generic";

    pub const USER_AGENT: &'static str = "notebooklm-rpc/0.1";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

    /// Pause after a refresh completes, before waiters are released.
    /// Re-calling the RPC surface in the same instant the tokens rotate
    /// trips the service's abuse heuristics.
    pub const REFRESH_SETTLE_DELAY: Duration = Duration::from_millis(500);
}
