//! Hierarchical memory graph for sprig.
//!
//! Memories are organized as `Domain -> Topic -> Detail`, with `Insight`
//! nodes distilled from details and attached to topics. The graph lives in
//! PostgreSQL with the Apache AGE extension; an in-process backend with the
//! same semantics is available for tests and offline use.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RetrievalEngine                                                        │
//! │  - expand query, lexical candidates, embedding rerank, insights         │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GraphStore                                                             │
//! │  - idempotent merges, fresh details/insights, edge-label priming        │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  QueryExecutor                                                          │
//! │  - identifier validation, transient-race retry, agtype decoding         │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                    │                                   │
//!                    ▼                                   ▼
//!          ┌──────────────────┐               ┌──────────────────────┐
//!          │   AgeBackend     │               │ InMemoryGraphBackend │
//!          │ (sqlx + AGE SQL) │               │     (tests)          │
//!          └──────────────────┘               └──────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sprig_llm::LocalEmbedder;
//! use sprig_memory::{AgeBackend, ClusterInsert, GraphStore, QueryExecutor, RetrievalEngine};
//!
//! # async fn demo() -> sprig_memory::Result<()> {
//! let backend = AgeBackend::connect("postgres://localhost/sprig").await?;
//! let store = Arc::new(GraphStore::new(QueryExecutor::new(Arc::new(backend)), "gmemory"));
//! store.ensure_graph().await?;
//!
//! store
//!     .insert_cluster_topic_detail(ClusterInsert::new("Food", "ramen", "Ate at Ichiran", "chat"))
//!     .await?;
//!
//! let engine = RetrievalEngine::new(store, Arc::new(LocalEmbedder::default()));
//! println!("{}", engine.recall("ramen", 5).await?);
//! # Ok(())
//! # }
//! ```

pub mod agtype;
pub mod backend;
pub mod error;
pub mod executor;
pub mod query;
pub mod retrieval;
pub mod store;
pub mod types;

pub use agtype::parse_agtype;
pub use backend::{AgeBackend, GraphBackend, InMemoryGraphBackend, SharedGraphBackend};
pub use error::{MemoryError, Result};
pub use executor::{QueryExecutor, RetryPolicy, validate_identifier};
pub use query::{QueryKind, Statement};
pub use retrieval::{
    NO_RELEVANT_MEMORY, RetrievalConfig, RetrievalEngine, expand_query, format_results,
    group_candidates, recall_text,
};
pub use store::GraphStore;
pub use types::{
    Candidate, ClusterInsert, ClusterInsertResult, Detail, DetailContext, Domain, GENERAL_DOMAIN,
    Insight, MemoryRecord, NodeLabel, RelationType, StoreStats, Topic, TopicSummary,
    normalize_domain_label,
};
