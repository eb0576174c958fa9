//! Runtime error types.

use plugify_framework::ManagerError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A plugin lifecycle operation failed.
    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No manager is registered for the service.
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// A manager is already registered for the service.
    #[error("Service already exists: {0}")]
    ServiceExists(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
