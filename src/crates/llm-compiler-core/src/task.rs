//! The [`Task`] record and its argument model.
//!
//! A task is one action line of a plan: a tool call with an ordered argument
//! list where any string argument may embed `$k` references to a prior task's
//! observation (§3, "Task").

use serde_json::Value;
use std::collections::BTreeSet;

/// One positional argument to a task. Kept as `serde_json::Value` so literal
/// lists/tuples/scalars round-trip through the planner's best-effort literal
/// evaluator (§4.1, "Argument parsing") without a bespoke value type.
pub type TaskArg = Value;

/// A single task parsed from one action line of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// 1-based, strictly increasing within one plan.
    pub idx: u32,
    /// Name of the tool to invoke; `"join"` for the terminal task.
    pub tool_name: String,
    /// Ordered argument list as parsed, with `$k` references left verbatim
    /// inside string arguments for the task fetching unit to substitute.
    pub raw_args: Vec<TaskArg>,
    /// Optional planner rationale preceding this action line.
    pub thought: Option<String>,
    /// Task indices this task's arguments reference via `$k`.
    pub dependencies: BTreeSet<u32>,
    /// Filled in by the task fetching unit once the tool has run.
    pub observation: Option<String>,
}

impl Task {
    /// Construct a task, computing `dependencies` from `$k` references found
    /// anywhere inside the (possibly nested) argument values.
    pub fn new(
        idx: u32,
        tool_name: impl Into<String>,
        raw_args: Vec<TaskArg>,
        thought: Option<String>,
    ) -> Self {
        let mut dependencies = BTreeSet::new();
        for arg in &raw_args {
            collect_references(arg, &mut dependencies);
        }
        Self {
            idx,
            tool_name: tool_name.into(),
            raw_args,
            thought,
            dependencies,
            observation: None,
        }
    }

    /// Whether this task is the plan's terminal `join` action.
    pub fn is_join(&self) -> bool {
        self.tool_name == crate::tool::JOIN_TOOL_NAME
    }

    /// `true` once the task fetching unit has recorded an observation.
    pub fn is_resolved(&self) -> bool {
        self.observation.is_some()
    }
}

/// Scan a (possibly nested) argument value for `$k` reference tokens and add
/// the referenced indices to `out`. Recurses into list-typed arguments
/// element-wise per §4.3, "Argument substitution rules".
fn collect_references(value: &Value, out: &mut BTreeSet<u32>) {
    match value {
        Value::String(s) => {
            for idx in find_dollar_refs(s) {
                out.insert(idx);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

/// Find every `$k` occurrence in `text` and return the referenced indices.
pub fn find_dollar_refs(text: &str) -> Vec<u32> {
    let mut refs = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 {
                if let Ok(k) = text[i + 1..j].parse::<u32>() {
                    refs.push(k);
                }
            }
            i = j.max(i + 1);
        } else {
            i += 1;
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dependencies_found_in_string_args() {
        let task = Task::new(2, "B", vec![json!("$1!")], None);
        assert_eq!(task.dependencies, BTreeSet::from([1]));
    }

    #[test]
    fn dependencies_found_inside_lists() {
        let task = Task::new(3, "B", vec![json!(["$1"]), json!("hi")], None);
        assert_eq!(task.dependencies, BTreeSet::from([1]));
    }

    #[test]
    fn multiple_references_in_one_argument() {
        let refs = find_dollar_refs("$1 and $2 and $1 again");
        assert_eq!(refs, vec![1, 2, 1]);
    }

    #[test]
    fn join_is_recognized_structurally() {
        let task = Task::new(3, "join", vec![], None);
        assert!(task.is_join());
    }

    #[test]
    fn no_dependencies_on_plain_literal() {
        let task = Task::new(1, "A", vec![json!(42)], None);
        assert!(task.dependencies.is_empty());
    }
}
