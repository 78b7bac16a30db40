use thiserror::Error;

/// A recoverable failure raised by a source backend while gathering a
/// report. Logged as an error and retried at the next interval; under
/// one-shot it is surfaced to the destination as an [`ErrorReport`](crate::ErrorReport).
#[derive(Debug, Error)]
#[error("virt backend error: {0}")]
pub struct VirtError(pub String);

impl VirtError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The destination-manager error taxonomy. Modeled as one tagged union
/// rather than three distinct exception types, per the "avoid deep
/// hierarchies" design note: a throttle response isn't really an error, a
/// recoverable error retries at the next interval, a fatal error is the
/// operator's problem to fix (and only changes one-shot bookkeeping).
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The server responded with a rate-limit signal carrying a retry-after
    /// duration in seconds. Not itself a failure.
    #[error("throttled, retry after {retry_after}s")]
    Throttle {
        /// Seconds the caller should wait before retrying.
        retry_after: u64,
    },
    /// A recoverable destination error. The current batch/submission is
    /// abandoned; it will be retried next interval because the last-sent
    /// hash is left untouched.
    #[error("manager error: {0}")]
    Recoverable(String),
    /// A fatal destination error. Under one-shot the affected sources are
    /// marked erred; a long-running worker still retries next interval.
    #[error("fatal manager error: {0}")]
    Fatal(String),
}

/// Raised at startup when the resolved configuration is invalid. Always
/// fatal: no workers start.
#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

impl ConfigError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
