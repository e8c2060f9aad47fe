//! The Task Fetching Unit (C4): a dataflow scheduler that dispatches each
//! task the instant its dependencies are satisfied and runs independent
//! tasks concurrently (§4.3).

use crate::error::{CoreError, Result};
use crate::plan::ObservationLog;
use crate::task::Task;
use crate::tool::ToolRegistry;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// One item on the channel the streaming planner feeds into the fetching
/// unit: either a parsed task, or the distinguished end-of-plan sentinel
/// (§4.3, "Inputs").
pub enum TfuInput {
    Task(Task),
    EndOfPlan,
}

/// Drive the scheduling loop described in §4.3 to completion: dispatch tasks
/// as their dependencies are satisfied, await the join barrier, and record
/// every observation (including the join's own, which carries no output of
/// its own tools but is recorded for transcript completeness).
///
/// Per the open question on join timing (§9), a `join` that leaves `pending`
/// non-empty (dependencies whose producer was skipped) is reported as an
/// error rather than waited on forever.
pub async fn run(
    mut rx: mpsc::Receiver<TfuInput>,
    registry: &ToolRegistry,
    log: &mut ObservationLog,
) -> Result<()> {
    let mut pending: Vec<Task> = Vec::new();
    let mut running: JoinSet<Task> = JoinSet::new();
    let mut plan_ended = false;
    let mut join_task: Option<Task> = None;

    while !plan_ended || !running.is_empty() {
        tokio::select! {
            biased;
            incoming = rx.recv(), if !plan_ended => {
                match incoming {
                    Some(TfuInput::Task(task)) if task.is_join() => {
                        join_task = Some(task);
                        plan_ended = true;
                    }
                    Some(TfuInput::Task(task)) => {
                        dispatch_or_queue(task, registry, log, &mut pending, &mut running);
                    }
                    Some(TfuInput::EndOfPlan) | None => {
                        plan_ended = true;
                    }
                }
            }
            Some(joined) = running.join_next(), if !running.is_empty() => {
                let task = joined.map_err(|e| CoreError::Execution(e.to_string()))?;
                log.record(&task, registry);
                redispatch_pending(registry, log, &mut pending, &mut running);
            }
        }
    }

    if !pending.is_empty() {
        return Err(CoreError::Execution(format!(
            "{} task(s) never became dispatchable: a dependency's producer was never scheduled",
            pending.len()
        )));
    }

    if let Some(join) = join_task {
        log.record(&join, registry);
    }

    Ok(())
}

fn dispatch_or_queue(
    task: Task,
    registry: &ToolRegistry,
    log: &ObservationLog,
    pending: &mut Vec<Task>,
    running: &mut JoinSet<Task>,
) {
    if log.satisfies(&task.dependencies) {
        spawn_task(task, registry, log, running);
    } else {
        pending.push(task);
    }
}

fn redispatch_pending(
    registry: &ToolRegistry,
    log: &ObservationLog,
    pending: &mut Vec<Task>,
    running: &mut JoinSet<Task>,
) {
    let ready: Vec<Task> = {
        let mut still_pending = Vec::with_capacity(pending.len());
        let mut ready = Vec::new();
        for task in pending.drain(..) {
            if log.satisfies(&task.dependencies) {
                ready.push(task);
            } else {
                still_pending.push(task);
            }
        }
        *pending = still_pending;
        ready
    };
    for task in ready {
        spawn_task(task, registry, log, running);
    }
}

fn spawn_task(mut task: Task, registry: &ToolRegistry, log: &ObservationLog, running: &mut JoinSet<Task>) {
    let substituted: Vec<Value> = task.raw_args.iter().map(|arg| substitute(arg, log)).collect();
    let tool = registry.get(&task.tool_name).cloned();
    running.spawn(async move {
        let observation = match tool {
            Some(tool) => match tool.invoke(substituted).await {
                Ok(observation) => observation,
                Err(err) => format!("Error: {err}"),
            },
            None => format!("Error: tool '{}' is not registered", task.tool_name),
        };
        task.observation = Some(observation);
        task
    });
}

/// Substitute `$k` reference tokens inside string arguments with the
/// observation text of task `k`, recursing into list-typed arguments
/// element-wise. Non-string, non-list values pass through unchanged
/// (§4.3, "Argument substitution rules").
pub fn substitute(value: &Value, log: &ObservationLog) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_string(s, log)),
        Value::Array(items) => Value::Array(items.iter().map(|item| substitute(item, log)).collect()),
        other => other.clone(),
    }
}

fn substitute_string(s: &str, log: &ObservationLog) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '$' {
            let start = i + 1;
            let mut end = start;
            while let Some((j, d)) = chars.peek().copied() {
                if d.is_ascii_digit() {
                    end = j + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            if end > start {
                if let Ok(k) = s[start..end].parse::<u32>() {
                    match log.get(k) {
                        Some(observation) => result.push_str(observation),
                        None => result.push_str(&s[i..end]),
                    }
                    continue;
                }
            }
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn registry_with_a_b() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "A",
                "returns hello",
                Some(0),
                Arc::new(|_args| Box::pin(async move { Ok("hello".to_string()) })),
            ))
            .unwrap();
        registry
            .register(Tool::new(
                "B",
                "appends !",
                Some(1),
                Arc::new(|args| {
                    Box::pin(async move {
                        let input = args.first().and_then(|v| v.as_str()).unwrap_or_default();
                        Ok(format!("{input}!"))
                    })
                }),
            ))
            .unwrap();
        registry
    }

    async fn drive(registry: &ToolRegistry, tasks: Vec<Task>) -> (Result<()>, ObservationLog) {
        let (tx, rx) = mpsc::channel(8);
        let mut log = ObservationLog::new();
        for task in tasks {
            tx.send(TfuInput::Task(task)).await.unwrap();
        }
        drop(tx);
        let result = run(rx, registry, &mut log).await;
        (result, log)
    }

    #[tokio::test]
    async fn linear_dependency_is_resolved_before_dispatch() {
        let registry = registry_with_a_b();
        let tasks = vec![
            Task::new(1, "A", vec![], None),
            Task::new(2, "B", vec![json!("$1")], None),
            Task::new(3, "join", vec![], None),
        ];
        let (result, log) = drive(&registry, tasks).await;
        result.unwrap();
        assert_eq!(log.get(1), Some("hello"));
        assert_eq!(log.get(2), Some("hello!"));
    }

    #[tokio::test]
    async fn join_only_plan_completes_with_empty_log() {
        let registry = ToolRegistry::new();
        let tasks = vec![Task::new(1, "join", vec![], None)];
        let (result, log) = drive(&registry, tasks).await;
        result.unwrap();
        assert_eq!(log.get(1), Some(""));
    }

    #[tokio::test]
    async fn independent_tasks_overlap_in_time() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "A",
                "sleeps then returns a",
                Some(0),
                Arc::new(|_| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("a".to_string())
                    })
                }),
            ))
            .unwrap();
        registry
            .register(Tool::new(
                "B",
                "sleeps then returns b",
                Some(0),
                Arc::new(|_| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("b".to_string())
                    })
                }),
            ))
            .unwrap();
        let tasks = vec![
            Task::new(1, "A", vec![], None),
            Task::new(2, "B", vec![], None),
            Task::new(3, "join", vec![], None),
        ];
        let start = Instant::now();
        let (result, _log) = drive(&registry, tasks).await;
        result.unwrap();
        assert!(start.elapsed() < Duration::from_millis(180), "tasks did not overlap");
    }

    #[tokio::test]
    async fn tool_invocation_error_is_captured_as_error_observation() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "A",
                "always fails",
                Some(0),
                Arc::new(|_| Box::pin(async move { Err("boom".to_string()) })),
            ))
            .unwrap();
        let tasks = vec![Task::new(1, "A", vec![], None), Task::new(2, "join", vec![], None)];
        let (result, log) = drive(&registry, tasks).await;
        result.unwrap();
        assert_eq!(log.get(1), Some("Error: boom"));
    }

    #[tokio::test]
    async fn list_argument_substitution_recurses_into_elements() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "A",
                "returns x@y",
                Some(0),
                Arc::new(|_| Box::pin(async move { Ok("x@y".to_string()) })),
            ))
            .unwrap();
        registry
            .register(Tool::new(
                "B",
                "echoes its args back joined",
                Some(2),
                Arc::new(|args| {
                    Box::pin(async move {
                        let list = args[0].as_array().cloned().unwrap_or_default();
                        let first = list[0].as_str().unwrap_or_default();
                        let second = args[1].as_str().unwrap_or_default();
                        Ok(format!("{first}|{second}"))
                    })
                }),
            ))
            .unwrap();
        let tasks = vec![
            Task::new(1, "A", vec![], None),
            Task::new(2, "B", vec![json!(["$1"]), json!("hi")], None),
            Task::new(3, "join", vec![], None),
        ];
        let (result, log) = drive(&registry, tasks).await;
        result.unwrap();
        assert_eq!(log.get(2), Some("x@y|hi"));
    }

    #[tokio::test]
    async fn pending_task_with_never_satisfied_dependency_is_reported() {
        let registry = registry_with_a_b();
        // Task 2 depends on task 1, but task 1 is never sent: only the join arrives.
        let tasks = vec![Task::new(2, "B", vec![json!("$1")], None), Task::new(3, "join", vec![], None)];
        let (result, _log) = drive(&registry, tasks).await;
        assert!(result.is_err());
    }

    #[test]
    fn substitute_replaces_dollar_tokens_in_strings_only() {
        let mut log = ObservationLog::new();
        let registry = ToolRegistry::new();
        let mut t1 = Task::new(1, "A", vec![], None);
        t1.observation = Some("hello".to_string());
        log.record(&t1, &registry);

        let result = substitute(&json!("say $1 now"), &log);
        assert_eq!(result, json!("say hello now"));

        let unchanged = substitute(&json!(42), &log);
        assert_eq!(unchanged, json!(42));
    }
}
