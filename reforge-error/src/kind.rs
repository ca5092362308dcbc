//! Error kinds for reforge operations

use std::fmt;

/// The kind of error that occurred.
///
/// This enum categorizes errors to help users write clear error handling logic.
/// Users can match on ErrorKind to decide how to handle specific error cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    // =========================================================================
    // Backend/LLM errors
    // =========================================================================
    /// The model backend call failed
    BackendFailed,

    /// Context too large for the model
    ContextTooLarge,

    /// Provider not available
    ProviderUnavailable,

    /// Rate limit exceeded
    RateLimited,

    /// Authentication with the backend failed
    AuthenticationFailed,

    // =========================================================================
    // Execution errors
    // =========================================================================
    /// Generated code failed during execution
    ExecutionFailed,

    /// Code execution exceeded the wall-clock timeout
    ExecutionTimeout,

    /// The sandbox interpreter could not be launched
    SandboxUnavailable,

    // =========================================================================
    // Session errors
    // =========================================================================
    /// Attempt budget for the session is exhausted
    BudgetExhausted,

    /// Session is already terminated
    SessionTerminated,

    // =========================================================================
    // Search errors
    // =========================================================================
    /// Web search or page fetch failed
    SearchFailed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input
    ParseFailed,

    /// Serialization/deserialization failed
    SerializationFailed,

    /// Invalid argument passed to function
    InvalidArgument,

    /// Feature or operation not yet implemented
    NotImplemented,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            // Backend
            ErrorKind::BackendFailed => "BackendFailed",
            ErrorKind::ContextTooLarge => "ContextTooLarge",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            // Execution
            ErrorKind::ExecutionFailed => "ExecutionFailed",
            ErrorKind::ExecutionTimeout => "ExecutionTimeout",
            ErrorKind::SandboxUnavailable => "SandboxUnavailable",

            // Session
            ErrorKind::BudgetExhausted => "BudgetExhausted",
            ErrorKind::SessionTerminated => "SessionTerminated",

            // Search
            ErrorKind::SearchFailed => "SearchFailed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            // Parse
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotImplemented => "NotImplemented",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::BackendFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::ProviderUnavailable
                | ErrorKind::ExecutionTimeout
                | ErrorKind::SearchFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::BackendFailed.to_string(), "BackendFailed");
        assert_eq!(ErrorKind::ExecutionTimeout.to_string(), "ExecutionTimeout");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::ParseFailed.is_retryable());
        assert!(!ErrorKind::BudgetExhausted.is_retryable());
    }
}
