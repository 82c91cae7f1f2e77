//! Graph store: the domain API over the memory graph.
//!
//! All uniqueness and idempotency rules live here:
//!
//! - Domains merge on normalized label, topics on exact text.
//! - Details and insights are always created fresh.
//! - Links merge, so re-linking the same pair is a no-op.
//! - A detail's `insight_pending` flag only ever goes from true to false.
//!
//! Operations are split by concern: `entity_ops` (node writes), `link_ops`
//! (edges and edge-label priming) and `read_ops` (queries).

mod entity_ops;
mod link_ops;
mod read_ops;

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::query::Statement;
use crate::types::RelationType;

/// Memory graph store bound to one named graph.
#[derive(Debug)]
pub struct GraphStore {
    executor: QueryExecutor,
    graph: String,
    /// Edge labels this store has already primed.
    primed: Mutex<HashSet<RelationType>>,
}

impl GraphStore {
    /// Create a store for `graph`. The name is validated on first use.
    pub fn new(executor: QueryExecutor, graph: impl Into<String>) -> Self {
        Self {
            executor,
            graph: graph.into(),
            primed: Mutex::new(HashSet::new()),
        }
    }

    /// The graph this store reads and writes.
    pub fn graph_name(&self) -> &str {
        &self.graph
    }

    /// Create the graph if it does not exist yet.
    ///
    /// Safe to call from several processes at once: losing the creation race
    /// ("already exists") counts as success.
    pub async fn ensure_graph(&self) -> Result<()> {
        if self.executor.graph_exists(&self.graph).await? {
            debug!(graph = %self.graph, "Graph already present");
            return Ok(());
        }

        match self.executor.create_graph(&self.graph).await {
            Ok(()) => {
                info!(graph = %self.graph, "Created graph");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(graph = %self.graph, "Graph created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn run(&self, statement: Statement) -> Result<Vec<Value>> {
        self.executor.execute(&self.graph, &statement).await
    }

    /// Run a statement and decode every row into `T`.
    async fn fetch_all<T: DeserializeOwned>(&self, statement: Statement) -> Result<Vec<T>> {
        self.run(statement)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(Into::into))
            .collect()
    }

    /// Run a statement and decode the first row, if any.
    async fn fetch_optional<T: DeserializeOwned>(&self, statement: Statement) -> Result<Option<T>> {
        match self.run(statement).await?.into_iter().next() {
            Some(row) if !row.is_null() => Ok(Some(serde_json::from_value(row)?)),
            _ => Ok(None),
        }
    }
}
