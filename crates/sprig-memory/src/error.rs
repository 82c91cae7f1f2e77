//! Error types for the memory crate.

use sprig_llm::LlmError;
use thiserror::Error;

/// Message fragments that mark a failure as a benign race between concurrent
/// writers (label/table creation or entity update conflicts).
const TRANSIENT_RACE_MARKERS: &[&str] = &[
    "already exists",
    "duplicate key",
    "concurrent update",
    "concurrently updated",
    "could not serialize access",
    "deadlock detected",
    "failed to be updated",
];

/// Errors that can occur in the memory crate.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Graph name failed identifier validation; nothing was sent to the store.
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// A concurrent-writer race that persisted through every retry.
    #[error("Transient store race persisted after {attempts} attempts: {message}")]
    TransientRace {
        /// Attempts made, including the first.
        attempts: u32,
        /// The last error message reported by the store.
        message: String,
    },

    /// PostgreSQL transport failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure reported by a non-SQL graph backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Embedding provider failure.
    #[error("Embedding error: {0}")]
    Embedding(#[from] LlmError),

    /// Invalid data or state.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl MemoryError {
    /// Returns true if the failure looks like a benign concurrent-schema or
    /// concurrent-update race that is worth retrying.
    pub fn is_transient_race(&self) -> bool {
        match self {
            Self::Database(_) | Self::Backend(_) => {
                let message = self.to_string().to_lowercase();
                TRANSIENT_RACE_MARKERS.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }

    /// Returns true if the store reported that the object already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Backend(_))
            && self.to_string().to_lowercase().contains("already exists")
    }
}

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
