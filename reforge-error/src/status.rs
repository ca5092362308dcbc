//! Error status - how an error should be handled

use std::fmt;

/// Whether an error is worth retrying.
///
/// - `Permanent`: retrying will not help
/// - `Temporary`: retrying may succeed
/// - `Persistent`: was temporary, but retries were exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// The error is permanent - retrying will not help
    Permanent,
    /// The error is temporary - retrying may succeed
    Temporary,
    /// The error was temporary but retries failed - treat as permanent now
    Persistent,
}

impl ErrorStatus {
    /// Check if an operation that hit this status should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorStatus::Temporary)
    }

    /// Transition after failed retries: Temporary becomes Persistent,
    /// other statuses are unchanged.
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
