//! Typed error surface for the communication core.

use thiserror::Error;

/// Errors surfaced by endpoint construction, framing, the RPC overlay and the
/// variadic convenience layer.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("endpoint {0:?} is not valid (construction failed or already released)")]
    InvalidEndpoint(String),

    #[error("failed to allocate a buffer of {0} bytes")]
    AllocationFailure(usize),

    #[error("transport {kind} failed: {source}")]
    Transport {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to parse frame header: {0}")]
    HeaderParseFailure(String),

    #[error("serializer failure: {0}")]
    SerializerFailure(String),

    #[error("EOF was already sent on this endpoint")]
    EofAlreadySent,

    #[error("no response is pending (client recv with an empty reply queue, or server send with no remembered reply target)")]
    NoResponsePending,

    #[error("unsupported transport kind: {0}")]
    UnsupportedKind(String),

    #[error("exit drain timed out waiting for the peer to consume pending messages")]
    DrainTimeout,
}

impl CommError {
    pub fn transport(kind: &'static str, source: impl Into<anyhow::Error>) -> Self {
        CommError::Transport {
            kind,
            source: source.into(),
        }
    }
}

/// Logs an `Err` at `error` level and marks the process-wide error flag
/// (`SPEC_FULL.md` §10.1: "every framing/RPC/registry operation that
/// surfaces a `CommError` logs it at error level before returning it"; §4.8/
/// §7: the exit drain suppresses its best-effort EOF once a prior error has
/// been recorded), then passes the result through unchanged. Called once at
/// the boundary of each framing/RPC/registry operation rather than at every
/// internal construction site, so a single failure inside a multi-step
/// operation (a multipart chunk send, an RPC round-trip) is reported once,
/// not once per propagation hop.
pub(crate) fn observe<T>(result: CommResult<T>) -> CommResult<T> {
    if let Err(ref e) = result {
        tracing::error!("{e}");
        crate::registry::Runtime::global().set_error_flag();
    }
    result
}

/// Result of a framed `recv`, distinguishing ordinary data from the EOF signal
/// without resorting to a sentinel return code (cf. `SPEC_FULL.md` §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    Data(Vec<u8>),
    Eof,
}

impl RecvOutcome {
    pub fn into_data(self) -> Result<Vec<u8>, CommError> {
        match self {
            RecvOutcome::Data(bytes) => Ok(bytes),
            RecvOutcome::Eof => Err(CommError::HeaderParseFailure(
                "expected data, got EOF".to_string(),
            )),
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, RecvOutcome::Eof)
    }
}

pub type CommResult<T> = Result<T, CommError>;
