//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent workflows.
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM backend or embedding error.
    #[error("LLM error: {0}")]
    Llm(#[from] sprig_llm::LlmError),

    /// Memory graph error.
    #[error("Memory error: {0}")]
    Memory(#[from] sprig_memory::MemoryError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// A detail referenced by a workflow no longer exists.
    #[error("Detail not found: {0}")]
    DetailNotFound(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::tool("unknown command");
        assert!(err.to_string().contains("Tool error"));
        assert!(err.to_string().contains("unknown command"));
    }

    #[test]
    fn test_memory_error_converts() {
        let err: AgentError = sprig_memory::MemoryError::InvalidIdentifier("a b".into()).into();
        assert!(matches!(err, AgentError::Memory(_)));
    }
}
