//! Shared fixtures for workflow tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sprig_llm::{LocalEmbedder, SharedEmbedder};
use sprig_memory::{GraphStore, InMemoryGraphBackend, QueryExecutor};

use crate::error::{AgentError, Result};
use crate::reasoner::Reasoner;
use crate::tool::{CommandHandler, CommandResult};

const GRAPH: &str = "gmemory_test";

/// A store over a fresh in-memory graph and a local embedder.
pub(crate) fn memory_store() -> (Arc<GraphStore>, SharedEmbedder) {
    let backend = Arc::new(InMemoryGraphBackend::with_graph(GRAPH));
    let store = GraphStore::new(QueryExecutor::new(backend), GRAPH);
    (Arc::new(store), Arc::new(LocalEmbedder::default()))
}

/// Unwrap a successful command result.
pub(crate) fn tool_json(result: CommandResult) -> Value {
    match result {
        CommandResult::Json(value) => value,
        CommandResult::Error(e) => panic!("tool failed: {e}"),
    }
}

/// One scripted tool call. String arguments of the form `$N.field` are
/// replaced by `field` of the N-th result.
pub(crate) struct Step {
    name: String,
    arguments: Value,
}

impl Step {
    pub(crate) fn new(name: &str, arguments: Value) -> Self {
        Self {
            name: name.to_string(),
            arguments,
        }
    }
}

fn substitute(value: &Value, results: &[CommandResult]) -> Value {
    match value {
        Value::String(s) if s.starts_with('$') => {
            let Some((index, field)) = s[1..].split_once('.') else {
                return value.clone();
            };
            let index: usize = index.parse().unwrap_or(usize::MAX);
            match results.get(index) {
                Some(CommandResult::Json(result)) => result[field].clone(),
                _ => Value::Null,
            }
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, results)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Reasoner that replays a fixed list of tool calls for every prompt.
pub(crate) struct ScriptedReasoner {
    steps: Vec<Step>,
    fail_on: Option<String>,
    answer: String,
    prompts: Mutex<Vec<String>>,
    results: Mutex<Vec<CommandResult>>,
}

impl ScriptedReasoner {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            fail_on: None,
            answer: "done".to_string(),
            prompts: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
        }
    }

    /// Fail any run whose prompt contains `needle`.
    pub(crate) fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub(crate) fn results(&self) -> Vec<CommandResult> {
        self.results.lock().clone()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn run(&self, prompt: &str, handler: &dyn CommandHandler) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(needle) = &self.fail_on
            && prompt.contains(needle.as_str())
        {
            return Err(AgentError::tool("scripted failure"));
        }

        let mut results = Vec::new();
        for step in &self.steps {
            let arguments = substitute(&step.arguments, &results);
            results.push(handler.handle(&step.name, arguments).await);
        }
        self.results.lock().extend(results);
        Ok(self.answer.clone())
    }

    async fn ask(&self, _system: &str, _prompt: &str) -> Result<String> {
        Ok(self.answer.clone())
    }
}
