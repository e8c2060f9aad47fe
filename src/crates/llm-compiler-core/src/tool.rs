//! Tool registry for the LLM Compiler.
//!
//! Tools in this crate are intentionally narrow compared to a general
//! function-calling framework: the core only ever sees a tool as a named
//! callable that accepts an ordered tuple of JSON-like argument values and
//! returns a string observation (§1, "named callables taking JSON-like
//! argument tuples and returning a string observation"). Argument *shape*
//! (arity) is fixed per tool and used only for prompt rendering and
//! diagnostics; the scheduler does not enforce it before dispatch.
//!
//! `"join"` is reserved: it is never registered here, and is instead recognized
//! structurally by the plan parser (see [`crate::parser`]).

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The reserved tool name that marks the terminal task of a plan.
pub const JOIN_TOOL_NAME: &str = "join";

/// A tool invocation's positional arguments, already substituted for `$k`
/// references (see [`crate::tfu`]).
pub type ToolArgs = Vec<Value>;

/// A tool's asynchronous body. Tools never "fail" the scheduler: invocation
/// errors are caught by the caller and folded into the observation text
/// (§4.3, "Tool-error policy"), so the executor signature returns a plain
/// `Result<String, String>` rather than propagating `CoreError`.
pub type ToolInvoke =
    Arc<dyn Fn(ToolArgs) -> futures::future::BoxFuture<'static, std::result::Result<String, String>> + Send + Sync>;

/// A named, callable tool as consumed by the planner prompt and the task
/// fetching unit.
#[derive(Clone)]
pub struct Tool {
    /// Unique name used in plan action lines, e.g. `search_contacts`.
    pub name: String,
    /// Human-readable description embedded verbatim into the planner prompt.
    pub description: String,
    /// Fixed positional arity. `None` means variadic.
    pub arity: Option<usize>,
    invoke: ToolInvoke,
}

impl Tool {
    /// Define a new tool from an async closure.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        arity: Option<usize>,
        invoke: ToolInvoke,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            arity,
            invoke,
        }
    }

    /// Run the tool body. Never panics on tool-side errors: they come back as
    /// `Err(message)` for the caller to fold into the observation log with the
    /// `"Error: "` prefix (§4.3).
    pub async fn invoke(&self, args: ToolArgs) -> std::result::Result<String, String> {
        (self.invoke)(args).await
    }

    /// Render `name(a, b, c)` the way the transcript block does (§4.3).
    pub fn stringify_call(&self, args: &[Value]) -> String {
        let rendered = args
            .iter()
            .map(render_literal)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, rendered)
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Render a `serde_json::Value` as a plan-literal for transcript output.
/// Strings keep their quotes; everything else uses its natural form.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

/// Holds the set of callable tools by name for one orchestrator instance.
///
/// Invariant: tool names are unique across the registry, and `"join"` is
/// never registered (§3, Tool invariant).
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
    /// Insertion order, preserved so the planner prompt numbers tools
    /// deterministically (§4.2, "Preamble ... listing the registered tools
    /// (numbered)").
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Rejects the reserved name `"join"` and duplicate names.
    pub fn register(&mut self, tool: Tool) -> Result<()> {
        if tool.name == JOIN_TOOL_NAME {
            return Err(CoreError::ReservedToolName);
        }
        if self.tools.contains_key(&tool.name) {
            return Err(CoreError::DuplicateTool(tool.name));
        }
        self.order.push(tool.name.clone());
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tools in registration order, for prompt rendering.
    pub fn iter_in_order(&self) -> impl Iterator<Item = &Tool> {
        self.order.iter().filter_map(move |name| self.tools.get(name))
    }

    /// Number of registered tools (excluding the synthetic `join`).
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// A trait object wrapper so sub-agent or remote tools can be registered
/// alongside plain closures without changing the [`ToolRegistry`] API.
///
/// Most tools are simple enough to construct with [`Tool::new`] directly;
/// this trait exists for tools that carry their own mutable state across a
/// single request (§5, "Tool implementations themselves may carry mutable
/// state ... this is documented per tool and must be single-request scoped").
#[async_trait]
pub trait StatefulTool: Send + Sync {
    /// Tool name, matching the plan's action line.
    fn name(&self) -> &str;
    /// Description embedded in the planner prompt.
    fn description(&self) -> &str;
    /// Execute with already-substituted arguments.
    async fn invoke(&self, args: ToolArgs) -> std::result::Result<String, String>;
}

/// Adapt a [`StatefulTool`] into a registry [`Tool`].
pub fn from_stateful(tool: Arc<dyn StatefulTool>) -> Tool {
    let name = tool.name().to_string();
    let description = tool.description().to_string();
    let invoke: ToolInvoke = Arc::new(move |args| {
        let tool = tool.clone();
        Box::pin(async move { tool.invoke(args).await })
    });
    Tool::new(name, description, None, invoke)
}
