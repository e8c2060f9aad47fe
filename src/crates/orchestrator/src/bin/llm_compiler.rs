//! `llm-compiler` CLI - run a single query through the LLM Compiler core.
//!
//! Real tool integrations (calendar, mail, maps, ...) are external
//! collaborators the orchestrator is deliberately ignorant of; this binary
//! registers a small set of text-processing demo tools instead, just enough
//! to exercise the plan/execute/join/replan loop end to end.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use llm::chat::ChatModel;
use llm::config::{LocalLlmConfig, RemoteLlmConfig};
use llm::local::OllamaClient;
use llm::mock::MockChatModel;
use llm::remote::OpenAiClient;
use llm_compiler_core::tool::{Tool, ToolRegistry};
use orchestrator::config::OrchestratorConfig;
use orchestrator::LlmCompiler;

#[derive(Parser)]
#[command(name = "llm-compiler")]
#[command(about = "Run a query through the LLM Compiler's plan/execute/join/replan loop", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run against a scripted, offline model. Useful for seeing the loop
    /// work without a running LLM server.
    Demo {
        /// The query to plan for.
        query: String,
        #[arg(long, default_value_t = 2)]
        max_replans: u32,
    },
    /// Run against a locally hosted Ollama server.
    Ollama {
        query: String,
        #[arg(long, default_value = "http://localhost:11434")]
        base_url: String,
        #[arg(long, default_value = "llama3")]
        model: String,
        #[arg(long, default_value_t = 2)]
        max_replans: u32,
    },
    /// Run against an OpenAI-compatible endpoint.
    OpenAi {
        query: String,
        #[arg(long, default_value = "https://api.openai.com/v1")]
        base_url: String,
        #[arg(long, default_value = "gpt-4o")]
        model: String,
        #[arg(long, env = "OPENAI_API_KEY")]
        api_key: String,
        #[arg(long, default_value_t = 2)]
        max_replans: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Demo { query, max_replans } => run_demo(query, max_replans).await,
        Command::Ollama { query, base_url, model, max_replans } => {
            let client = Arc::new(OllamaClient::new(LocalLlmConfig::new(base_url, model)));
            run_against(query, client, max_replans).await
        }
        Command::OpenAi { query, base_url, model, api_key, max_replans } => {
            let client = Arc::new(OpenAiClient::new(RemoteLlmConfig::new(api_key, base_url, model)));
            run_against(query, client, max_replans).await
        }
    }
}

/// Runs the loop with a scripted model that always plans a single call to
/// `word_count` followed by `join`, independent of the query text, so the
/// demo works without any network access.
async fn run_demo(query: String, max_replans: u32) -> anyhow::Result<()> {
    let registry = demo_registry();
    let plan = format!("1. word_count(\"{query}\")\n2. join()\n<END_OF_PLAN>\n");
    let planner: Arc<dyn ChatModel> = Arc::new(MockChatModel::new([plan]));
    // `$k` is only substituted into task arguments by the task fetching unit
    // (§4.3); a scripted joinner response is plain text, so the word count is
    // computed here rather than embedding a `$1` that would never resolve.
    let word_count = query.split_whitespace().count();
    let joinner: Arc<dyn ChatModel> =
        Arc::new(MockChatModel::new([format!("Action: Finish(\"{query}\" has {word_count} words.)")]));

    let config = OrchestratorConfig::default().with_max_replans(max_replans);
    let compiler = LlmCompiler::new(registry, planner, joinner, config);
    let answer = compiler.run(query).await?;
    println!("{answer}");
    Ok(())
}

async fn run_against(query: String, model: Arc<dyn ChatModel>, max_replans: u32) -> anyhow::Result<()> {
    let registry = demo_registry();
    let config = OrchestratorConfig::default().with_max_replans(max_replans);
    let compiler = LlmCompiler::new(registry, model.clone(), model, config);
    let answer = compiler.run(query).await?;
    println!("{answer}");
    Ok(())
}

fn demo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(Tool::new(
            "word_count",
            "word_count(text): counts the words in a string and returns the count",
            Some(1),
            Arc::new(|args| {
                Box::pin(async move {
                    let text = args.first().and_then(|v| v.as_str()).unwrap_or_default();
                    Ok(text.split_whitespace().count().to_string())
                })
            }),
        ))
        .expect("word_count is not the reserved join name");
    registry
        .register(Tool::new(
            "shout",
            "shout(text): uppercases a string",
            Some(1),
            Arc::new(|args| {
                Box::pin(async move {
                    let text = args.first().and_then(|v| v.as_str()).unwrap_or_default();
                    Ok(text.to_uppercase())
                })
            }),
        ))
        .expect("shout is not the reserved join name");
    registry
}
