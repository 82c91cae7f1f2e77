//! Query execution with identifier validation, race retries and decoding.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::agtype::parse_agtype;
use crate::backend::GraphBackend;
use crate::error::{MemoryError, Result};
use crate::query::Statement;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// Check that `name` is a plain identifier safe to splice into SQL.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(MemoryError::InvalidIdentifier(name.to_string()))
    }
}

/// Bounded retry for transient store races.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before retry `n` is `backoff_step * n`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(100),
        }
    }
}

/// Executes statements against a [`GraphBackend`].
#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn GraphBackend>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn GraphBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend(&self) -> &Arc<dyn GraphBackend> {
        &self.backend
    }

    /// Whether the named graph exists.
    pub async fn graph_exists(&self, graph: &str) -> Result<bool> {
        validate_identifier(graph)?;
        self.backend.graph_exists(graph).await
    }

    /// Create the named graph.
    pub async fn create_graph(&self, graph: &str) -> Result<()> {
        validate_identifier(graph)?;
        self.backend.create_graph(graph).await
    }

    /// Run a statement and decode every row.
    ///
    /// The graph name is validated before any I/O. Transient races are
    /// retried with linear backoff; anything else propagates on first failure.
    pub async fn execute(&self, graph: &str, statement: &Statement) -> Result<Vec<Value>> {
        validate_identifier(graph)?;

        let mut attempt = 1;
        loop {
            match self.backend.cypher(graph, statement).await {
                Ok(rows) => {
                    debug!(
                        graph = %graph,
                        query = statement.kind.name(),
                        rows = rows.len(),
                        "Executed statement"
                    );
                    return Ok(rows.iter().map(|r| parse_agtype(r)).collect());
                }
                Err(e) if !e.is_transient_race() => return Err(e),
                Err(e) if attempt >= self.retry.max_attempts => {
                    return Err(MemoryError::TransientRace {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    let backoff = self.retry.backoff_step * attempt;
                    warn!(
                        graph = %graph,
                        query = statement.kind.name(),
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient store race, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryGraphBackend;
    use crate::query::QueryKind;
    use serde_json::json;

    fn executor(backend: Arc<InMemoryGraphBackend>) -> QueryExecutor {
        QueryExecutor::new(backend).with_retry_policy(RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1),
        })
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("gmemory").is_ok());
        assert!(validate_identifier("_g2").is_ok());
        assert!(validate_identifier("2g").is_err());
        assert!(validate_identifier("g-1").is_err());
        assert!(validate_identifier("g'); DROP TABLE x; --").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[tokio::test]
    async fn test_invalid_graph_name_does_no_io() {
        let backend = Arc::new(InMemoryGraphBackend::with_graph("g"));
        let exec = executor(backend.clone());

        let result = exec
            .execute("bad name", &Statement::bare(QueryKind::NodeCounts))
            .await;
        assert!(matches!(result, Err(MemoryError::InvalidIdentifier(_))));
        assert!(backend.executed().is_empty());
    }

    #[tokio::test]
    async fn test_retries_transient_race_then_succeeds() {
        let backend = Arc::new(InMemoryGraphBackend::with_graph("g"));
        backend.fail_next(2, "could not serialize access due to concurrent update");
        let exec = executor(backend.clone());

        let rows = exec
            .execute(
                "g",
                &Statement::new(
                    QueryKind::MergeDomain,
                    json!({"label": "Food", "id": "d1", "created_at": "t0"}),
                ),
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["label"], "Food");
        assert_eq!(backend.count_executed(QueryKind::MergeDomain), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let backend = Arc::new(InMemoryGraphBackend::with_graph("g"));
        backend.fail_next(5, "label HAS_TOPIC already exists");
        let exec = executor(backend.clone());

        let result = exec
            .execute("g", &Statement::bare(QueryKind::NodeCounts))
            .await;
        match result {
            Err(MemoryError::TransientRace { attempts, message }) => {
                assert_eq!(attempts, 3);
                assert!(message.contains("already exists"));
            }
            other => panic!("expected TransientRace, got {other:?}"),
        }
        assert_eq!(backend.count_executed(QueryKind::NodeCounts), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let backend = Arc::new(InMemoryGraphBackend::with_graph("g"));
        backend.fail_next(1, "syntax error at end of input");
        let exec = executor(backend.clone());

        let result = exec
            .execute("g", &Statement::bare(QueryKind::NodeCounts))
            .await;
        assert!(matches!(result, Err(MemoryError::Backend(_))));
        assert_eq!(backend.count_executed(QueryKind::NodeCounts), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_linear() {
        let backend = Arc::new(InMemoryGraphBackend::with_graph("g"));
        backend.fail_next(2, "deadlock detected");
        let exec = QueryExecutor::new(backend);

        let start = tokio::time::Instant::now();
        exec.execute("g", &Statement::bare(QueryKind::NodeCounts))
            .await
            .unwrap();
        // 100ms after the first failure, 200ms after the second.
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }
}
