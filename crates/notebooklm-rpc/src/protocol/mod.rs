//! Wire protocol: parameter trees, request encoding, response decoding.
//!
//! This module provides:
//! - Positional parameter trees with explicit null slots
//! - Method descriptors and the known-method table
//! - Envelope encoding (`f.req`/`at` form fields, request URL)
//! - Chunk-stream decoding and protocol-drift tracking

mod decoder;
mod encoder;
pub mod methods;
mod params;

pub use decoder::{decode_response, Decoded, DecodedResult, DriftTracker, RESPONSE_GUARD};
pub use encoder::{encode, request_url, RequestEnvelope};
pub use methods::RpcMethod;
pub use params::ParamValue;
