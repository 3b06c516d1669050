//! Durable per-device storage for the Statcheck client core.
//!
//! The anonymous identity and the onboarding marker must survive process
//! restarts, so they live behind a small key/value contract with
//! platform-specific implementations (secure enclave on mobile, browser
//! storage on web, a JSON file here). This crate provides:
//! - The [`DeviceStorage`] trait every platform implements
//! - [`FileStorage`], the file-backed default
//! - [`MemoryStorage`], an in-memory implementation for tests
//! - [`DeviceStore`], the typed facade used by the identity core

mod device;
mod file;
mod keys;
mod memory;
mod traits;

pub use device::DeviceStore;
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::DeviceStorage;

use thiserror::Error;

/// Error type for storage operations.
///
/// Storage failures are fatal for identity establishment: without the
/// anonymous id and the onboarding flag the core cannot derive a status.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
