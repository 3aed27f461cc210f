//! Error status - whether an error is worth retrying

use std::fmt;

/// How an error should be handled by the caller.
///
/// - `Permanent`: retrying will not help, give up
/// - `Temporary`: the operation may succeed if retried
/// - `Persistent`: was temporary, but retries were exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// The error is final; retrying the operation cannot succeed
    Permanent,
    /// The error is transient; the operation may be retried
    Temporary,
    /// The error was transient but retries have been exhausted
    Persistent,
}

impl ErrorStatus {
    /// Whether the caller may retry the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorStatus::Temporary)
    }

    /// Transition a temporary error to persistent after failed retries.
    ///
    /// Permanent stays permanent.
    pub fn persist(self) -> Self {
        match self {
            ErrorStatus::Temporary => ErrorStatus::Persistent,
            other => other,
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorStatus::Permanent => "permanent",
            ErrorStatus::Temporary => "temporary",
            ErrorStatus::Persistent => "persistent",
        };
        write!(f, "{}", s)
    }
}
