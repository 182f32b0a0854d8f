//! Transport orchestration, retry policy, and the HTTP seam.

mod client;
mod http;
mod retry;

pub use client::{CallOptions, RpcClient, RpcClientBuilder};
pub use http::{HttpTransport, ReqwestTransport, WireResponse};
pub use retry::RetryPolicy;
