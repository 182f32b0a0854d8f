//! Response decoding for the batchexecute chunk stream.
//!
//! A response body starts with a fixed anti-XSSI guard, then a stream of
//! newline-delimited JSON array records. Result frames are tagged
//! `wrb.fr`; the stream also interleaves chunk-length integers and
//! control records, which are skipped record by record.

use crate::{Result, RpcError};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Fixed guard prefix; its absence means the body is not a batchexecute
/// response at all (commonly an HTML error page).
pub const RESPONSE_GUARD: &str = ")]}'";

/// Tag of a result-bearing record.
const RESULT_FRAME_TAG: &str = "wrb.fr";

/// Result of the frame scan for the requested method.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResult {
    /// The matching frame carried a payload.
    Value(Value),
    /// The call completed and legitimately returned nothing. Distinct
    /// from `NotFound`.
    Empty,
    /// No frame matched the requested method id after a full scan.
    NotFound,
}

/// A decoded response: the outcome for the requested method plus every
/// other method id seen in result frames, for drift diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub result: DecodedResult,
    pub unrequested: Vec<String>,
}

/// Decode a raw response body for the given method id.
///
/// The whole stream is scanned even after a match so that frames for
/// methods we never requested still reach the drift tracker.
pub fn decode_response(raw: &str, method_id: &str) -> Result<Decoded> {
    let Some(rest) = raw.strip_prefix(RESPONSE_GUARD) else {
        return Err(RpcError::Decoding {
            message: format!(
                "response missing {RESPONSE_GUARD:?} guard prefix; not a batchexecute response"
            ),
        });
    };

    let mut matched: Option<DecodedResult> = None;
    let mut unrequested = Vec::new();
    for line in rest.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Chunk-length integers and malformed records are skipped, not
        // fatal: the stream interleaves unrelated control records.
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            debug!("Skipping unparseable response record");
            continue;
        };
        let Some(fields) = record.as_array() else {
            continue;
        };
        if fields.first().and_then(Value::as_str) != Some(RESULT_FRAME_TAG) {
            continue;
        }
        let Some(frame_method) = fields.get(1).and_then(Value::as_str) else {
            continue;
        };
        if frame_method != method_id {
            unrequested.push(frame_method.to_string());
            continue;
        }
        if matched.is_none() {
            matched = Some(decode_payload(fields.get(2))?);
        }
    }

    Ok(Decoded {
        result: matched.unwrap_or(DecodedResult::NotFound),
        unrequested,
    })
}

/// Second parse pass: the frame payload is itself a serialized string.
fn decode_payload(payload: Option<&Value>) -> Result<DecodedResult> {
    match payload {
        None | Some(Value::Null) => Ok(DecodedResult::Empty),
        Some(Value::String(text)) => {
            if text.is_empty() {
                return Ok(DecodedResult::Empty);
            }
            let value: Value = serde_json::from_str(text).map_err(|e| RpcError::Decoding {
                message: format!("result payload is not valid JSON: {e}"),
            })?;
            if value.is_null() {
                Ok(DecodedResult::Empty)
            } else {
                Ok(DecodedResult::Value(value))
            }
        }
        Some(other) => Err(RpcError::Decoding {
            message: format!("result payload has unexpected shape: {other}"),
        }),
    }
}

/// Deduplicated drift observations for one client context.
///
/// The remote service renames method ids without notice; a frame for an id
/// we never requested is the early-warning signal. Each id is reported
/// once for the lifetime of the owning client.
#[derive(Debug, Default)]
pub struct DriftTracker {
    unrequested: Mutex<HashSet<String>>,
    missing: Mutex<HashSet<String>>,
}

impl DriftTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a method id observed in a response but never requested.
    /// Returns true (and logs) only on first observation.
    pub fn note_unrequested(&self, method_id: &str) -> bool {
        let mut seen = self.unrequested.lock().expect("drift set poisoned");
        if !seen.insert(method_id.to_string()) {
            return false;
        }
        warn!(
            method_id,
            "Unknown RPC method observed in response; upstream protocol may have drifted"
        );
        true
    }

    /// Record a requested method id that was absent from its response.
    /// Returns true (and logs) only on first observation.
    pub fn note_missing(&self, method_id: &str) -> bool {
        let mut seen = self.missing.lock().expect("drift set poisoned");
        if !seen.insert(method_id.to_string()) {
            return false;
        }
        warn!(
            method_id,
            "Requested RPC method missing from response; id may have been renamed upstream"
        );
        true
    }

    /// Every unrequested method id seen so far, for health checks.
    pub fn unrequested_ids(&self) -> Vec<String> {
        let seen = self.unrequested.lock().expect("drift set poisoned");
        let mut ids: Vec<String> = seen.iter().cloned().collect();
        ids.sort();
        ids
    }
}
