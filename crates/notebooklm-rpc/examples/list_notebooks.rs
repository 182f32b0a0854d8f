//! List notebooks using credentials saved by a login bootstrap.
//!
//! Usage:
//!   cargo run --package notebooklm-rpc --example list_notebooks -- /path/to/credentials.json
//!
//! The credentials file is the JSON serialization of `Credentials`
//! (cookies, anti-forgery token, session id).

use notebooklm_rpc::protocol::methods;
use notebooklm_rpc::{CallOptions, Credentials, RetryPolicy, RpcClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./credentials.json".to_string());

    let raw = std::fs::read_to_string(&path)?;
    let credentials: Credentials = serde_json::from_str(&raw)?;

    let client = RpcClient::builder(credentials).build()?;

    let options = CallOptions::new().with_retry(RetryPolicy::new().with_max_rate_limit_retries(2));
    let notebooks = client
        .issue(
            methods::LIST_NOTEBOOKS,
            notebooklm_rpc::ParamValue::Null,
            options,
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&notebooks)?);

    Ok(())
}
