//! Engine error types.

/// Engine error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller passed a value the operation cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Memory not found
    #[error("Memory not found: {0}")]
    NotFound(String),
    /// Operation conflicts with existing state
    #[error("Conflict: {0}")]
    Conflict(String),
    /// I/O or lock acquisition failed; the engine is read-only from here on
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Schema mismatch detected at open
    #[error("Database corruption: schema version {found} (this build supports up to {supported})")]
    Corruption {
        /// Version found in the schema_version table
        found: u32,
        /// Highest version this build knows how to open
        supported: u32,
    },
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::StorageUnavailable(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::StorageUnavailable(e.to_string())
    }
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;
