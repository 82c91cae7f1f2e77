//! Graph transport backends.
//!
//! A [`GraphBackend`] moves statements to a property-graph store and hands
//! back one raw `agtype` text value per row. Validation, retries and decoding
//! live one level up in [`QueryExecutor`](crate::executor::QueryExecutor).

mod age;
mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::query::Statement;

pub use age::AgeBackend;
pub use memory::InMemoryGraphBackend;

/// Transport seam between the executor and a graph store.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Whether a graph with this name exists in the catalog.
    async fn graph_exists(&self, graph: &str) -> Result<bool>;

    /// Create a graph. Fails with an "already exists" error if it does.
    async fn create_graph(&self, graph: &str) -> Result<()>;

    /// Run one statement in its own transaction; returns raw `agtype` text per row.
    ///
    /// `graph` has already been validated as a plain identifier.
    async fn cypher(&self, graph: &str, statement: &Statement) -> Result<Vec<String>>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Thread-safe shared backend handle.
pub type SharedGraphBackend = Arc<dyn GraphBackend>;
