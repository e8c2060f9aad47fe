//! [`Plan`], the [`ObservationLog`], and transcript serialization.

use crate::task::Task;
use crate::tool::{render_literal, ToolRegistry};
use std::collections::BTreeMap;

/// An ordered sequence of tasks produced by one planner invocation (§3, "Plan").
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub tasks: Vec<Task>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plan's terminal join task, if present.
    pub fn join_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.is_join())
    }

    /// Validate the plan invariants from §3/§8:
    /// indices are `1..=N` with no gaps, dependencies only point backwards,
    /// and exactly one task is the (highest-indexed) join.
    pub fn validate(&self) -> Result<(), String> {
        for (position, task) in self.tasks.iter().enumerate() {
            let expected = (position + 1) as u32;
            if task.idx != expected {
                return Err(format!(
                    "plan indices must be 1..N with no gaps; expected {expected}, found {}",
                    task.idx
                ));
            }
            for dep in &task.dependencies {
                if *dep >= task.idx {
                    return Err(format!(
                        "task {} references task {} which is not a prior task",
                        task.idx, dep
                    ));
                }
            }
        }
        let join_count = self.tasks.iter().filter(|t| t.is_join()).count();
        if join_count != 1 {
            return Err(format!("plan must contain exactly one join task, found {join_count}"));
        }
        if let Some(join) = self.join_task() {
            let max_idx = self.tasks.iter().map(|t| t.idx).max().unwrap_or(0);
            if join.idx != max_idx {
                return Err("join task must have the highest index in the plan".to_string());
            }
        }
        Ok(())
    }
}

/// A mapping from task index to observation string, plus the originating task
/// record, maintained per query across replan rounds (§3, "Observation Log").
/// Entries from earlier rounds are never mutated or deleted; later rounds only
/// append.
#[derive(Debug, Clone, Default)]
pub struct ObservationLog {
    entries: BTreeMap<u32, LogEntry>,
}

#[derive(Debug, Clone)]
struct LogEntry {
    tool_name: String,
    stringified_args: String,
    thought: Option<String>,
    observation: String,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed task's observation. Idempotent per index: later
    /// writes to the same index are rejected since earlier entries must never
    /// be mutated once committed.
    pub fn record(&mut self, task: &Task, registry: &ToolRegistry) {
        let stringified_args = registry
            .get(&task.tool_name)
            .map(|t| t.stringify_call(&task.raw_args))
            .unwrap_or_else(|| {
                let rendered = task
                    .raw_args
                    .iter()
                    .map(render_literal)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({})", task.tool_name, rendered)
            });
        self.entries.entry(task.idx).or_insert(LogEntry {
            tool_name: task.tool_name.clone(),
            stringified_args,
            thought: task.thought.clone(),
            observation: task.observation.clone().unwrap_or_default(),
        });
    }

    /// Whether task `idx` has a recorded observation.
    pub fn contains(&self, idx: u32) -> bool {
        self.entries.contains_key(&idx)
    }

    /// The observation string for task `idx`, if recorded.
    pub fn get(&self, idx: u32) -> Option<&str> {
        self.entries.get(&idx).map(|e| e.observation.as_str())
    }

    /// Whether every index in `deps` has a recorded observation.
    pub fn satisfies<'a>(&self, deps: impl IntoIterator<Item = &'a u32>) -> bool {
        deps.into_iter().all(|k| self.contains(*k))
    }

    /// Serialize the executed tasks and observations in ascending index
    /// order, in the transcript block format of §4.3:
    ///
    /// ```text
    /// Idx: {k}
    /// Tool: {tool_name}({stringified_args})
    /// {optional "Thought: ..."}
    /// Observation: {observation}
    /// ```
    ///
    /// Concatenated entries are joined by a blank line. Deterministic under
    /// task order (§8, "Transcript serialization is deterministic").
    pub fn render_transcript(&self) -> String {
        self.entries
            .iter()
            .map(|(idx, entry)| {
                let mut block = format!("Idx: {idx}\nTool: {}\n", entry.stringified_args);
                if let Some(thought) = &entry.thought {
                    if !thought.is_empty() {
                        block.push_str(&format!("Thought: {thought}\n"));
                    }
                }
                block.push_str(&format!("Observation: {}", entry.observation));
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use serde_json::json;

    #[test]
    fn valid_plan_passes() {
        let plan = Plan {
            tasks: vec![
                Task::new(1, "A", vec![], None),
                Task::new(2, "B", vec![json!("$1")], None),
                Task::new(3, "join", vec![], None),
            ],
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn gap_in_indices_is_rejected() {
        let plan = Plan {
            tasks: vec![Task::new(1, "A", vec![], None), Task::new(3, "join", vec![], None)],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn forward_reference_is_rejected() {
        let plan = Plan {
            tasks: vec![
                Task::new(1, "A", vec![json!("$2")], None),
                Task::new(2, "B", vec![], None),
                Task::new(3, "join", vec![], None),
            ],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn join_only_plan_is_valid() {
        let plan = Plan {
            tasks: vec![Task::new(1, "join", vec![], None)],
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn transcript_is_blank_line_separated_and_ordered() {
        let registry = ToolRegistry::new();
        let mut log = ObservationLog::new();
        let mut t1 = Task::new(1, "A", vec![], None);
        t1.observation = Some("hello".to_string());
        let mut t2 = Task::new(2, "B", vec![json!("$1")], None);
        t2.observation = Some("hello!".to_string());
        log.record(&t1, &registry);
        log.record(&t2, &registry);
        let transcript = log.render_transcript();
        assert!(transcript.contains("Idx: 1"));
        assert!(transcript.contains("Observation: hello"));
        assert!(transcript.contains("\n\nIdx: 2"));
    }
}
