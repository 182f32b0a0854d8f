//! RPC method descriptors and the known-method table.
//!
//! Method ids are opaque six-character strings assigned by the remote
//! service; they carry no meaning and change without notice when the
//! service is redeployed (see the drift tracker in the decoder).

use std::fmt;

/// Descriptor for one remote operation: the opaque wire id plus a stable
/// human-readable name used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RpcMethod {
    id: &'static str,
    name: &'static str,
}

impl RpcMethod {
    pub const fn new(id: &'static str, name: &'static str) -> Self {
        Self { id, name }
    }

    /// The wire id embedded in envelopes and matched in result frames.
    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

// Known method ids, as currently served. Kept in one place so call sites
// and the drift health check agree on the expected ids. ACT_ON_SOURCES
// doubles as mind-map generation and POLL_STUDIO as artifact listing; the
// service reuses ids for both.

pub const LIST_NOTEBOOKS: RpcMethod = RpcMethod::new("wXbhsf", "ListNotebooks");
pub const CREATE_NOTEBOOK: RpcMethod = RpcMethod::new("CCqFvf", "CreateNotebook");
pub const GET_NOTEBOOK: RpcMethod = RpcMethod::new("rLM1Ne", "GetNotebook");
pub const DELETE_NOTEBOOK: RpcMethod = RpcMethod::new("WWINqb", "DeleteNotebook");
pub const ADD_SOURCE: RpcMethod = RpcMethod::new("izAoDd", "AddSource");
pub const SUMMARIZE: RpcMethod = RpcMethod::new("VfAZjd", "Summarize");
pub const CREATE_AUDIO: RpcMethod = RpcMethod::new("AHyHrd", "CreateAudio");
pub const CREATE_VIDEO: RpcMethod = RpcMethod::new("R7cb6c", "CreateVideo");
pub const POLL_STUDIO: RpcMethod = RpcMethod::new("gArtLc", "PollStudio");
pub const CREATE_ARTIFACT: RpcMethod = RpcMethod::new("xpWGLf", "CreateArtifact");
pub const ACT_ON_SOURCES: RpcMethod = RpcMethod::new("yyryJe", "ActOnSources");

/// All known methods, for drift health checks.
pub const ALL: &[RpcMethod] = &[
    LIST_NOTEBOOKS,
    CREATE_NOTEBOOK,
    GET_NOTEBOOK,
    DELETE_NOTEBOOK,
    ADD_SOURCE,
    SUMMARIZE,
    CREATE_AUDIO,
    CREATE_VIDEO,
    POLL_STUDIO,
    CREATE_ARTIFACT,
    ACT_ON_SOURCES,
];
