//! Request encoding for the batchexecute envelope.
//!
//! A call is a form-encoded POST: the `f.req` field carries the parameter
//! tree wrapped in the protocol's triple-nested array, the `at` field
//! carries the anti-forgery token, and the query string addresses the
//! method (`rpcids`) and the per-session request counter (`_reqid`).

use crate::config::ServiceConfig;
use crate::protocol::{ParamValue, RpcMethod};
use crate::{Result, RpcError};
use serde_json::{json, Value};

/// An encoded request, ready to POST.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// Sequence number consumed by this envelope. Assigned by the
    /// transport; strictly increasing for the session lifetime.
    pub sequence: u64,
    /// Wire id of the addressed method.
    pub method_id: &'static str,
    /// Form-encoded POST body (`f.req=…&at=…&`).
    pub form_body: String,
}

/// Encode a call into the wire envelope.
///
/// Fails with `Encoding` only for structurally invalid parameter trees;
/// encoding failures are never retried.
pub fn encode(
    method: RpcMethod,
    params: &ParamValue,
    sequence: u64,
    csrf_token: Option<&str>,
) -> Result<RequestEnvelope> {
    let serialized_params = params.serialize_compact()?;

    // Triple nesting: a batch of one request, each request being
    // [method_id, serialized_params, null, "generic"].
    let envelope: Value = json!([[[
        method.id(),
        serialized_params,
        Value::Null,
        ServiceConfig::ENVELOPE_KIND,
    ]]]);
    let envelope_text = serde_json::to_string(&envelope).map_err(|e| RpcError::Encoding {
        message: format!("envelope serialization failed: {e}"),
    })?;

    let mut form_body = format!("f.req={}", urlencoding::encode(&envelope_text));
    if let Some(token) = csrf_token {
        form_body.push_str("&at=");
        form_body.push_str(&urlencoding::encode(token));
        form_body.push('&');
    }

    Ok(RequestEnvelope {
        sequence,
        method_id: method.id(),
        form_body,
    })
}

/// Build the request URL for one call.
///
/// The session id rides in `f.sid`; `_reqid` is the sequence number, which
/// the service rejects when reused or out of order.
pub fn request_url(
    endpoint: &str,
    method: RpcMethod,
    session_id: &str,
    sequence: u64,
) -> Result<String> {
    let mut url = url::Url::parse(endpoint).map_err(|e| RpcError::Encoding {
        message: format!("invalid endpoint {endpoint:?}: {e}"),
    })?;
    url.query_pairs_mut()
        .append_pair("rpcids", method.id())
        .append_pair("source-path", ServiceConfig::SOURCE_PATH)
        .append_pair("f.sid", session_id)
        .append_pair("rt", "c")
        .append_pair("_reqid", &sequence.to_string());
    Ok(url.to_string())
}
