//! # orchestrator
//!
//! The orchestration core (C6): ties the streaming planner (C3), the task
//! fetching unit (C4), and the joinner (C5) into the bounded plan/execute/
//! join/replan loop described in spec §4.5.
//!
//! [`LlmCompiler`] owns one tool registry and a pair of chat models (the
//! planner may be a cheaper, locally hosted model than the joinner, or the
//! same model for both). [`LlmCompiler::begin_query`] spawns the loop for one
//! query and returns a join handle for the final answer alongside the
//! per-request [`llm_compiler_core::stream::StreamReceiver`] a transport
//! layer drains concurrently while the loop runs (§4.6).
//!
//! ```ignore
//! use llm::mock::MockChatModel;
//! use llm_compiler_core::tool::ToolRegistry;
//! use orchestrator::{config::OrchestratorConfig, LlmCompiler};
//! use std::sync::Arc;
//!
//! # async fn run() -> orchestrator::error::Result<()> {
//! let registry = ToolRegistry::new();
//! let planner = Arc::new(MockChatModel::new(["1. join()\n<END_OF_PLAN>\n"]));
//! let joinner = Arc::new(MockChatModel::new(["Action: Finish(done)"]));
//! let compiler = LlmCompiler::new(registry, planner, joinner, OrchestratorConfig::default());
//! let answer = compiler.run("a query").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod joinner;
pub mod planner;
pub mod prompt;
pub mod version;

use std::sync::Arc;

use llm::chat::ChatModel;
use llm_compiler_core::plan::ObservationLog;
use llm_compiler_core::stream::{self, StreamReceiver};
use llm_compiler_core::tfu;
use llm_compiler_core::tool::ToolRegistry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{OrchestratorError, Result};
use crate::joinner::JoinDecision;
use crate::planner::PlannerPrompt;
use crate::prompt::{FewShotExamples, ToolConditionalClause};

pub use config::OrchestratorConfig;

/// One configured instance of the LLM Compiler core: a tool registry plus the
/// two model roles the loop drives (§4.1, "Components").
///
/// Cloning is cheap: every field is either an `Arc` or small owned data, so an
/// `LlmCompiler` can be shared across concurrently in-flight queries without
/// wrapping it in a mutex — each query gets its own channels and observation
/// log (§3, "Observation Log ... maintained per query").
#[derive(Clone)]
pub struct LlmCompiler {
    registry: ToolRegistry,
    planner_llm: Arc<dyn ChatModel>,
    joinner_llm: Arc<dyn ChatModel>,
    config: OrchestratorConfig,
    conditional_clauses: Vec<ToolConditionalClause>,
    examples: FewShotExamples,
}

impl LlmCompiler {
    /// Construct an instance. `planner_llm` and `joinner_llm` may be the same
    /// model wrapped in the same `Arc`, or distinct models (the original
    /// separates a cheaper streaming-capable planner model from the joinner).
    pub fn new(
        registry: ToolRegistry,
        planner_llm: Arc<dyn ChatModel>,
        joinner_llm: Arc<dyn ChatModel>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            planner_llm,
            joinner_llm,
            config,
            conditional_clauses: Vec::new(),
            examples: FewShotExamples::default(),
        }
    }

    /// Attach tool-conditional prompt clauses (§4.2 point 3).
    pub fn with_conditional_clauses(mut self, clauses: Vec<ToolConditionalClause>) -> Self {
        self.conditional_clauses = clauses;
        self
    }

    /// Attach the planner's few-shot example blocks (§4.2 point 6).
    pub fn with_examples(mut self, examples: FewShotExamples) -> Self {
        self.examples = examples;
        self
    }

    /// Spawn the plan/execute/join/replan loop for one query and return
    /// immediately with a join handle for the eventual answer and the
    /// streaming output channel's consumer half.
    ///
    /// The returned [`StreamReceiver`] should be drained concurrently with
    /// awaiting the join handle: the loop sends every planner token to it as
    /// each round streams in, across every replan round of this one query,
    /// and sends a final `End` when the loop is done (§4.6).
    pub fn begin_query(&self, query: impl Into<String>) -> (JoinHandle<Result<String>>, StreamReceiver) {
        let query = query.into();
        let (stream_tx, stream_rx) = stream::channel();
        let compiler = self.clone();
        let handle = tokio::spawn(async move { compiler.run_loop(query, stream_tx).await });
        (handle, stream_rx)
    }

    /// Convenience wrapper over [`Self::begin_query`] for callers that don't
    /// need the live token stream: drains it internally and returns only the
    /// final answer.
    pub async fn run(&self, query: impl Into<String>) -> Result<String> {
        let (handle, mut stream_rx) = self.begin_query(query);
        while stream_rx.recv().await.is_some() {}
        handle.await.map_err(|e| OrchestratorError::TaskJoin(e.to_string()))?
    }

    /// The bounded loop itself (§4.5): plan, execute, join, and on `Replan`
    /// feed the rendered transcript back in as context for the next planning
    /// round, up to `config.max_replans` additional rounds.
    async fn run_loop(&self, query: String, stream_tx: stream::StreamSender) -> Result<String> {
        if self.registry.is_empty() {
            return Err(OrchestratorError::EmptyRegistry);
        }
        self.config.validate().map_err(OrchestratorError::InvalidConfig)?;

        let prompt_config = PlannerPrompt {
            conditional_clauses: &self.conditional_clauses,
            custom_instructions: &self.config.custom_instructions,
            examples: &self.examples,
            end_of_plan_token: &self.config.end_of_plan_token,
        };

        let mut context: Option<String> = None;
        let mut replans_remaining = self.config.max_replans;
        let mut last_message = String::new();

        loop {
            let is_final_round = replans_remaining == 0;
            tracing::info!(is_replan = context.is_some(), is_final_round, "planning round starting");

            let (task_tx, task_rx) = mpsc::channel(64);
            let planner_fut = planner::run_streaming(
                self.planner_llm.as_ref(),
                &self.registry,
                &query,
                context.as_deref(),
                &prompt_config,
                task_tx,
                stream_tx.clone(),
            );
            let mut log = ObservationLog::new();
            let tfu_fut = tfu::run(task_rx, &self.registry, &mut log);
            let (planner_result, tfu_result) = tokio::join!(planner_fut, tfu_fut);
            planner_result?;
            tfu_result?;

            let transcript = log.render_transcript();
            let decision = joinner::join(self.joinner_llm.as_ref(), &query, &transcript, is_final_round, None).await?;

            match decision {
                JoinDecision::Finish(message) => {
                    tracing::info!("joinner finished the query");
                    stream_tx.send_end();
                    return Ok(message);
                }
                JoinDecision::Replan if is_final_round => {
                    // The final-round joinner prompt forbids Replan; a model
                    // that ignores it anyway falls back to the last round's
                    // running answer rather than looping forever (§4.4, "On
                    // the final round").
                    tracing::warn!("joinner replanned on the final round; finishing with last known message");
                    stream_tx.send_end();
                    return Ok(last_message);
                }
                JoinDecision::Replan => {
                    tracing::info!(replans_remaining, "joinner requested a replan");
                    last_message = String::new();
                    replans_remaining -= 1;
                    context = Some(transcript);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::mock::MockChatModel;
    use llm_compiler_core::tool::Tool;

    fn registry_with_search() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "search",
                "search(query): looks something up",
                Some(1),
                Arc::new(|args| Box::pin(async move { Ok(format!("result for {:?}", args)) })),
            ))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn finishes_on_the_first_round_when_joinner_is_satisfied() {
        let registry = registry_with_search();
        let planner = Arc::new(MockChatModel::new(["1. search(\"rust\")\n2. join()\n<END_OF_PLAN>\n"]));
        let joinner = Arc::new(MockChatModel::new(["Action: Finish(the answer)"]));
        let compiler = LlmCompiler::new(registry, planner, joinner, OrchestratorConfig::default());

        let answer = compiler.run("look up rust").await.unwrap();
        assert_eq!(answer, "the answer");
    }

    #[tokio::test]
    async fn replans_once_then_finishes() {
        let registry = registry_with_search();
        let planner = Arc::new(MockChatModel::new([
            "1. search(\"rust\")\n2. join()\n<END_OF_PLAN>\n",
            "1. search(\"rust lang\")\n2. join()\n<END_OF_PLAN>\n",
        ]));
        let joinner = Arc::new(MockChatModel::new(["Action: Replan", "Action: Finish(second try worked)"]));
        let compiler = LlmCompiler::new(registry, planner, joinner, OrchestratorConfig::default());

        let answer = compiler.run("look up rust").await.unwrap();
        assert_eq!(answer, "second try worked");
    }

    #[tokio::test]
    async fn non_streaming_planner_config_is_rejected_before_any_model_call() {
        let registry = registry_with_search();
        let planner = Arc::new(MockChatModel::new(Vec::<String>::new()));
        let joinner = Arc::new(MockChatModel::new(Vec::<String>::new()));
        let mut config = OrchestratorConfig::default();
        config.planner_stream = false;
        let compiler = LlmCompiler::new(registry, planner, joinner, config);

        let result = compiler.run("anything").await;
        assert!(matches!(result, Err(OrchestratorError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn empty_registry_is_rejected_before_any_model_call() {
        let registry = ToolRegistry::new();
        let planner = Arc::new(MockChatModel::new(Vec::<String>::new()));
        let joinner = Arc::new(MockChatModel::new(Vec::<String>::new()));
        let compiler = LlmCompiler::new(registry, planner, joinner, OrchestratorConfig::default());

        let result = compiler.run("anything").await;
        assert!(matches!(result, Err(OrchestratorError::EmptyRegistry)));
    }

    #[tokio::test]
    async fn stream_receiver_observes_every_planner_token() {
        let registry = registry_with_search();
        let planner = Arc::new(MockChatModel::new(["1. search(\"rust\")\n2. join()\n<END_OF_PLAN>\n"]));
        let joinner = Arc::new(MockChatModel::new(["Action: Finish(done)"]));
        let compiler = LlmCompiler::new(registry, planner, joinner, OrchestratorConfig::default());

        let (handle, mut stream_rx) = compiler.begin_query("look up rust");
        let mut tokens = Vec::new();
        while let Some(item) = stream_rx.recv().await {
            tokens.push(item);
        }
        let answer = handle.await.unwrap().unwrap();
        assert_eq!(answer, "done");
        assert!(!tokens.is_empty());
    }

    #[tokio::test]
    async fn replan_on_final_round_falls_back_to_last_message_instead_of_looping() {
        let registry = registry_with_search();
        let planner = Arc::new(MockChatModel::new(["1. search(\"x\")\n2. join()\n<END_OF_PLAN>\n"]));
        let joinner = Arc::new(MockChatModel::new(["Action: Replan"]));
        let config = OrchestratorConfig::default().with_max_replans(0);
        let compiler = LlmCompiler::new(registry, planner, joinner, config);

        let answer = compiler.run("look up x").await.unwrap();
        assert_eq!(answer, "");
    }
}
