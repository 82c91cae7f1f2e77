//! Reasoner-driven memory workflows for sprig.
//!
//! The memory graph decides nothing by itself: a reasoner (an LLM with
//! native tool calling) chooses which store operations to run. This crate
//! connects the two through a closed set of typed commands.
//!
//! ```text
//! ┌────────────────────┐      ┌────────────────────┐
//! │  InsightPipeline   │      │   UpdateWorkflow   │
//! │  pending details   │      │ remember/negotiate │
//! └─────────┬──────────┘      └─────────┬──────────┘
//!           │     Reasoner::run / ask   │
//!           ▼                           ▼
//! ┌───────────────────────────────────────────────────┐
//! │  ToolLoopReasoner  ──tool calls──►  MemoryToolbox │
//! │                                   (MemoryCommand) │
//! └───────────────────────────────────────────┬───────┘
//!                                             ▼
//!                                        GraphStore
//! ```

pub mod error;
pub mod insights;
pub mod prompt;
pub mod reasoner;
pub mod tool;
pub mod update;

#[cfg(test)]
mod test_support;

pub use error::{AgentError, Result};
pub use insights::{DEFAULT_BATCH_LIMIT, DetailOutcome, InsightBatchSummary, InsightPipeline};
pub use reasoner::{Reasoner, ReasonerConfig, TRUNCATED_RESPONSE, ToolLoopReasoner};
pub use tool::{CommandHandler, CommandResult, MemoryCommand, MemoryToolbox, Toolset};
pub use update::{Classification, NegotiatedPlacement, UpdateWorkflow, fallback_topic};
