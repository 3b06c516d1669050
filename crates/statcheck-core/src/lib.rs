//! Core configuration and utilities for the Statcheck client core.
//!
//! This crate provides:
//! - Configuration loading (file + environment)
//! - File system paths for client runtime files
//! - Logging initialization
//! - The shared core error type

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_LOG_LEVEL, DEFAULT_PROVIDER_PUBLISHABLE_KEY, DEFAULT_PROVIDER_URL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
