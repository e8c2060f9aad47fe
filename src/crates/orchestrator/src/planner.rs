//! The Streaming Planner (C3): builds the prompt, drives the chat model in
//! streaming mode, and feeds tokens to the plan parser and task fetching
//! unit as they arrive (§4.2).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use llm::chat::{ChatModel, ChatRequest, Message, StreamCallback};
use llm_compiler_core::parser::StreamingPlanParser;
use llm_compiler_core::stream::StreamSender;
use llm_compiler_core::tfu::TfuInput;
use llm_compiler_core::tool::ToolRegistry;
use tokio::sync::mpsc;

use crate::error::{OrchestratorError, Result};
use crate::prompt::{self, FewShotExamples, ToolConditionalClause};

/// Parameters that shape one planner invocation's prompt, independent of
/// the query itself.
pub struct PlannerPrompt<'a> {
    pub conditional_clauses: &'a [ToolConditionalClause],
    pub custom_instructions: &'a str,
    pub examples: &'a FewShotExamples,
    pub end_of_plan_token: &'a str,
}

/// Run one planning round: stream the plan from the model, feeding
/// recognized tasks into `task_tx` and echoing raw tokens to `stream_tx`.
///
/// `context` is `Some(transcript)` on a replan round and `None` on the
/// first round of a query (§4.2, "The human prompt").
pub async fn run_streaming(
    model: &dyn ChatModel,
    registry: &ToolRegistry,
    query: &str,
    context: Option<&str>,
    prompt_config: &PlannerPrompt<'_>,
    task_tx: mpsc::Sender<TfuInput>,
    stream_tx: StreamSender,
) -> Result<()> {
    let is_replan = context.is_some();
    let system_prompt = prompt::build_system_prompt(
        registry,
        prompt_config.conditional_clauses,
        prompt_config.custom_instructions,
        prompt_config.examples,
        prompt_config.end_of_plan_token,
        is_replan,
    );
    let human_prompt = prompt::build_human_prompt(query, context);

    let request = ChatRequest::new(vec![Message::system(system_prompt), Message::human(human_prompt)])
        .with_stop(vec![prompt_config.end_of_plan_token.to_string()]);

    let callback = PlannerCallback::new(registry, task_tx, stream_tx);
    model.stream(request, &callback).await.map_err(OrchestratorError::Llm)?;
    callback.finalize()
}

/// Bridges the model's token callbacks to the plan parser and the task
/// fetching unit's input channel. `StreamCallback`'s methods take `&self`
/// (the model holds one shared reference across the whole stream), so
/// mutable parser state lives behind a [`Mutex`].
struct PlannerCallback<'a> {
    parser: Mutex<StreamingPlanParser<'a>>,
    task_tx: mpsc::Sender<TfuInput>,
    stream_tx: StreamSender,
    last_idx: AtomicU32,
    /// Set once parse-error recovery has synthesized a join and requested
    /// the controlled early stop described in §4.2. Once set, further
    /// tokens are still echoed to the output channel but no longer fed to
    /// the parser or task channel.
    stopped: AtomicBool,
}

impl<'a> PlannerCallback<'a> {
    fn new(registry: &'a ToolRegistry, task_tx: mpsc::Sender<TfuInput>, stream_tx: StreamSender) -> Self {
        Self {
            parser: Mutex::new(StreamingPlanParser::new(registry)),
            task_tx,
            stream_tx,
            last_idx: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    fn push_task(&self, task: llm_compiler_core::Task) {
        let is_join = task.is_join();
        self.last_idx.store(task.idx, Ordering::Relaxed);
        if self.task_tx.try_send(TfuInput::Task(task)).is_err() {
            tracing::warn!("task fetching unit input channel is full or closed; dropping task");
        }
        if is_join {
            let _ = self.task_tx.try_send(TfuInput::EndOfPlan);
        }
    }

    /// Finish the stream: run the parser's `finalize()` to catch any task
    /// left in the buffer without a trailing newline.
    fn finalize(&self) -> Result<()> {
        if self.stopped.load(Ordering::Relaxed) {
            return Ok(());
        }
        let mut parser = self.parser.lock().unwrap();
        match parser.finalize() {
            Ok(Some(task)) => {
                drop(parser);
                self.push_task(task);
            }
            Ok(None) => {}
            Err(err) => {
                let fragment = parser.pending_fragment().to_string();
                drop(parser);
                self.recover_from_parse_error(&err, &fragment);
            }
        }
        Ok(())
    }

    /// Parse-error recovery (§4.2): synthesize a failing join task carrying
    /// the "try again" phrasing, push it (and the end-of-plan sentinel), and
    /// request the controlled early stop.
    fn recover_from_parse_error(&self, err: &llm_compiler_core::CoreError, fragment: &str) {
        let idx = self.last_idx.load(Ordering::Relaxed) + 1;
        let mut join = llm_compiler_core::Task::new(idx, llm_compiler_core::tool::JOIN_TOOL_NAME, vec![], None);
        join.observation = Some(err.as_join_observation(fragment));
        self.stopped.store(true, Ordering::Relaxed);
        self.push_task(join);
    }
}

impl<'a> StreamCallback for PlannerCallback<'a> {
    fn on_token(&self, token: &str) {
        self.stream_tx.send_token(token);
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }
        let mut parser = self.parser.lock().unwrap();
        match parser.ingest(token) {
            Ok(Some(task)) => {
                drop(parser);
                self.push_task(task);
            }
            Ok(None) => {}
            Err(err) => {
                let fragment = parser.pending_fragment().to_string();
                drop(parser);
                self.recover_from_parse_error(&err, &fragment);
            }
        }
    }

    fn on_end(&self) {
        // Finalization happens explicitly in `finalize()` once `stream()`
        // returns, since the parser may still hold a partial last line.
    }

    fn on_error(&self, error: &str) {
        // Terminal transport/provider error path (§4.2): surfaced to the
        // output channel so the transport layer can relay it to the caller.
        self.stream_tx.send_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::mock::MockChatModel;
    use llm_compiler_core::plan::ObservationLog;
    use llm_compiler_core::tfu;
    use llm_compiler_core::tool::Tool;
    use std::sync::Arc;

    fn registry_with_echo() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "search",
                "search(query): looks something up",
                Some(1),
                Arc::new(|args| {
                    Box::pin(async move { Ok(format!("result for {:?}", args)) })
                }),
            ))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn streams_tasks_into_the_task_fetching_unit() {
        let registry = registry_with_echo();
        let model = MockChatModel::new(["1. search(\"rust\")\n2. join()\n<END_OF_PLAN>\n"]);
        let (task_tx, task_rx) = mpsc::channel(16);
        let (stream_tx, mut stream_rx) = llm_compiler_core::stream::channel();

        let prompt_config = PlannerPrompt {
            conditional_clauses: &[],
            custom_instructions: "",
            examples: &FewShotExamples::default(),
            end_of_plan_token: "<END_OF_PLAN>",
        };

        let planner = run_streaming(&model, &registry, "look up rust", None, &prompt_config, task_tx, stream_tx);
        let mut log = ObservationLog::new();
        let (planner_result, tfu_result) = tokio::join!(planner, tfu::run(task_rx, &registry, &mut log));
        planner_result.unwrap();
        tfu_result.unwrap();

        assert!(log.get(1).unwrap().contains("result for"));
        while stream_rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn unknown_tool_triggers_synthetic_join_with_try_again() {
        let registry = registry_with_echo();
        let model = MockChatModel::new(["1. not_a_tool(\"x\")\n"]);
        let (task_tx, task_rx) = mpsc::channel(16);
        let (stream_tx, _stream_rx) = llm_compiler_core::stream::channel();

        let prompt_config = PlannerPrompt {
            conditional_clauses: &[],
            custom_instructions: "",
            examples: &FewShotExamples::default(),
            end_of_plan_token: "<END_OF_PLAN>",
        };

        let planner = run_streaming(&model, &registry, "do something", None, &prompt_config, task_tx, stream_tx);
        let mut log = ObservationLog::new();
        let (planner_result, tfu_result) = tokio::join!(planner, tfu::run(task_rx, &registry, &mut log));
        planner_result.unwrap();
        tfu_result.unwrap();

        let observation = log.get(1).unwrap();
        assert!(observation.contains("try again"));
    }
}
