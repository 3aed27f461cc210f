//! Error kinds for casagent operations

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

    // =========================================================================
    // Environment errors
    // =========================================================================
    /// The container engine binary is missing or not runnable
    EngineMissing,

    /// The CASA toolchain binary is missing or not runnable
    ToolchainMissing,

    /// The system prompt file could not be read
    PromptMissing,

    // =========================================================================
    // Container lifecycle errors
    // =========================================================================
    /// Creating the session container failed
    ContainerCreateFailed,

    // =========================================================================
    // Agent/conversation errors
    // =========================================================================
    /// The agent consumed its per-prompt turn budget
    TurnLimitExceeded,

    // =========================================================================
    // Inference/LLM errors
    // =========================================================================
    /// LLM inference failed
    InferenceFailed,

    /// Rate limit exceeded
    RateLimited,

    /// Authentication with the provider failed
    AuthenticationFailed,

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
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",

            // Environment
            ErrorKind::EngineMissing => "EngineMissing",
            ErrorKind::ToolchainMissing => "ToolchainMissing",
            ErrorKind::PromptMissing => "PromptMissing",

            // Container lifecycle
            ErrorKind::ContainerCreateFailed => "ContainerCreateFailed",

            // Agent/conversation
            ErrorKind::TurnLimitExceeded => "TurnLimitExceeded",

            // Inference
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            // Parse
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::TurnLimitExceeded
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
