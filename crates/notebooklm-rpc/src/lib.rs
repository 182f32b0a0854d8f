//! RPC transport core for NotebookLM's private batchexecute API.
//!
//! NotebookLM has no public API; its web frontend talks to a batch-style
//! RPC endpoint with positionally-addressed parameters, an anti-XSSI
//! guarded chunk stream, and short-lived session tokens. This crate
//! implements that transport: request encoding, response decoding,
//! credential lifecycle with single-flight refresh, retry/backoff for
//! throttling, and the call orchestration tying them together.
//!
//! Domain call sites (notebook CRUD, generation jobs, chat, research) sit
//! on top of [`RpcClient::issue`] and are not part of this crate, nor is
//! the interactive browser login that produces the initial credentials.
//!
//! # Example
//!
//! ```rust,ignore
//! use notebooklm_rpc::{CallOptions, Credentials, ParamValue, RpcClient};
//! use notebooklm_rpc::protocol::methods;
//!
//! #[tokio::main]
//! async fn main() -> notebooklm_rpc::Result<()> {
//!     let credentials = Credentials::from_pairs(
//!         [("SID", "…"), ("HSID", "…")],
//!         "csrf_token",
//!         "session_id",
//!     );
//!     let client = RpcClient::builder(credentials).build()?;
//!
//!     let notebooks = client
//!         .issue(methods::LIST_NOTEBOOKS, ParamValue::Null, CallOptions::new())
//!         .await?;
//!     println!("{notebooks}");
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use auth::{Cookie, Credentials, RefreshCoordinator, RefreshReason, SessionState};
pub use error::{Result, RpcError};
pub use protocol::{
    decode_response, encode, request_url, Decoded, DecodedResult, DriftTracker, ParamValue,
    RequestEnvelope, RpcMethod, RESPONSE_GUARD,
};
pub use transport::{
    CallOptions, HttpTransport, ReqwestTransport, RetryPolicy, RpcClient, RpcClientBuilder,
    WireResponse,
};
