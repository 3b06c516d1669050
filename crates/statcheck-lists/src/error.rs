//! Error types for list operations.

use thiserror::Error;

/// Error type for list operations.
///
/// Quota refusals are not errors; they come back as explicit outcome
/// variants so callers can render an upgrade prompt.
#[derive(Error, Debug)]
pub enum ListError {
    /// Identity has not settled yet; no user id to key data by
    #[error("identity is not ready")]
    NotReady,

    /// No list with that id (or it has been deleted)
    #[error("list not found: {0}")]
    NotFound(String),

    /// The list belongs to a different identity
    #[error("list {0} is not owned by the current identity")]
    NotOwner(String),

    /// Reorder input is not a permutation of the list's players
    #[error("invalid reorder: {0}")]
    InvalidReorder(String),

    /// The backing store failed
    #[error("store error: {0}")]
    Store(String),
}

/// Result type alias using ListError.
pub type ListResult<T> = Result<T, ListError>;
