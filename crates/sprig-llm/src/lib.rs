//! LLM and embedding abstractions for sprig.
//!
//! This crate provides the two external collaborators the memory engine talks
//! to: an embedding provider (text → unit-length vector) and a chat-completion
//! backend with native tool calling, used by the reasoner-driven workflows.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │  Embedder trait              │   │  LlmBackend trait            │
//! │  - embed() / embed_batch()   │   │  - complete() -> Response    │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!        │                │                 │               │
//!        ▼                ▼                 ▼               ▼
//! ┌─────────────┐ ┌────────────────┐ ┌─────────────┐ ┌─────────────┐
//! │LocalEmbedder│ │EmbeddingService│ │OpenAiBackend│ │ MockBackend │
//! └─────────────┘ │Client (+local) │ └─────────────┘ └─────────────┘
//!                 └────────────────┘
//! ```

pub mod backend;
pub mod embeddings;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, MockBackend, SharedBackend, with_retry};
pub use error::{LlmError, Result};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, Role, StopReason, ToolCall,
    ToolDefinition, ToolResultBlock,
};

pub use embeddings::{
    DEFAULT_EMBEDDING_DIMS, EmbedderSpec, Embedder, EmbeddingServiceClient, LocalEmbedder,
    SharedEmbedder, build_embedder, cosine_similarity,
};

pub use openai::{OpenAiBackend, OpenAiConfig};
