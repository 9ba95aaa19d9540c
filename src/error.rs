use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for trace operations.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors returned by the trace SDK.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Export failed with the error returned by the exporter.
    #[error("export failed: {0}")]
    ExportFailed(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Export failed to finish within the allowed time and was abandoned.
    #[error("export timed out after {} seconds", .0.as_secs())]
    ExportTimedOut(Duration),

    /// An operation was attempted on a component that has already shut down.
    #[error("already shutdown")]
    AlreadyShutdown,

    /// A caller violated the SDK usage contract, e.g. ended a span that is not
    /// the top of its context stack. Distinct from transport errors so it can
    /// be surfaced as a programmer error.
    #[error("usage violation: {0}")]
    UsageViolation(String),

    /// Configuration supplied at construction time was rejected. These are
    /// fatal to startup: tracing was requested but cannot be provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Other errors not covered by the variants above.
    #[error("{0}")]
    Other(String),
}

impl From<String> for TraceError {
    fn from(err_msg: String) -> Self {
        TraceError::Other(err_msg)
    }
}

impl From<&'static str> for TraceError {
    fn from(err_msg: &'static str) -> Self {
        TraceError::Other(err_msg.into())
    }
}

impl<T> From<PoisonError<T>> for TraceError {
    fn from(err: PoisonError<T>) -> Self {
        TraceError::Other(err.to_string())
    }
}
