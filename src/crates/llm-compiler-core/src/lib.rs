//! # llm-compiler-core
//!
//! The data model and dataflow scheduler at the center of the LLM Compiler:
//! a runtime that turns a plan text into a dependency graph of tool calls and
//! executes it with maximum parallelism.
//!
//! This crate owns four things:
//! - the [`tool`] registry tools are looked up from,
//! - the [`task`]/[`plan`] data model a plan is built from,
//! - the [`parser`], which turns plan text (batch or streaming) into tasks,
//! - the [`tfu`] dataflow scheduler, which dispatches tasks as their
//!   dependencies resolve and records observations.
//!
//! The planner prompt, the joinner, and the replan loop that tie these
//! together live one layer up, in the `orchestrator` crate; this crate has no
//! opinion on prompts or LLM providers.
//!
//! ## Quick start
//!
//! ```ignore
//! use llm_compiler_core::{parser, plan::ObservationLog, tfu, tool::ToolRegistry};
//! use tokio::sync::mpsc;
//!
//! # async fn run(registry: ToolRegistry, plan_text: &str) -> llm_compiler_core::error::Result<()> {
//! let tasks = parser::batch_parse(plan_text, &registry)?;
//! let (tx, rx) = mpsc::channel(16);
//! for task in tasks {
//!     let is_join = task.is_join();
//!     tx.send(tfu::TfuInput::Task(task)).await.ok();
//!     if is_join {
//!         break;
//!     }
//! }
//! drop(tx);
//! let mut log = ObservationLog::new();
//! tfu::run(rx, &registry, &mut log).await?;
//! println!("{}", log.render_transcript());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod parser;
pub mod plan;
pub mod stream;
pub mod task;
pub mod tfu;
pub mod tool;

pub use error::{CoreError, Result};
pub use plan::{ObservationLog, Plan};
pub use task::Task;
pub use tool::{Tool, ToolRegistry};
