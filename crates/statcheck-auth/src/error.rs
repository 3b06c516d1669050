//! Error types for the identity core.

use thiserror::Error;

/// Error type for identity core operations.
///
/// Expected, user-caused sign-in failures never appear here; those are
/// normalized into [`crate::AuthOutcome`] at the adapter boundary. This enum
/// covers configuration mistakes and infrastructure failures.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Configuration error (e.g. selecting an OAuth provider that was never
    /// configured for this build)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity provider returned something the adapter cannot interpret
    #[error("Provider error: {0}")]
    Provider(String),

    /// Backend returned an unexpected response
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP transport error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Durable storage failure; fatal for identity establishment
    #[error("Storage error: {0}")]
    Storage(#[from] statcheck_storage::StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
