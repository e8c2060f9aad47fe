//! The plan parser (C2): batch and streaming parsing of a textual plan into
//! typed [`Task`] records (§4.1).
//!
//! Two line kinds are recognized:
//! - a **Thought** line, `^Thought:\s*(.*)$`, whose text becomes the `thought`
//!   attached to the next action line;
//! - an **Action** line, `^\s*(\d+)\.\s*(\w+)\((.*)\)\s*(#.*)?$`.
//!
//! `raw_arg_string` is interpreted with a best-effort Python-literal-style
//! evaluator: the whole string is parsed as a bracketed argument list; on any
//! parse failure the raw string is kept as a single string argument.

use crate::error::{CoreError, Result};
use crate::task::Task;
use crate::tool::{ToolRegistry, JOIN_TOOL_NAME};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn thought_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Thought:\s*(.*)$").unwrap())
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)\.\s*(\w+)\((.*)\)\s*(#.*)?$").unwrap())
}

/// Parse `raw` (the text between an action's parentheses) into an ordered
/// argument list. See module docs for the fallback rule.
pub fn parse_args(raw: &str) -> Vec<Value> {
    let wrapped = format!("[{raw}]");
    let mut chars = wrapped.char_indices().peekable();
    match parse_value(&wrapped, &mut chars) {
        Some(Value::Array(items)) if remaining_is_whitespace(&wrapped, &mut chars) => items,
        _ => vec![Value::String(raw.trim().to_string())],
    }
}

fn remaining_is_whitespace(s: &str, chars: &mut std::iter::Peekable<std::str::CharIndices>) -> bool {
    let rest = match chars.peek() {
        Some((pos, _)) => &s[*pos..],
        None => "",
    };
    rest.trim().is_empty()
}

type Chars<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn skip_ws(chars: &mut Chars) {
    while matches!(chars.peek(), Some((_, c)) if c.is_whitespace()) {
        chars.next();
    }
}

fn parse_value(s: &str, chars: &mut Chars) -> Option<Value> {
    skip_ws(chars);
    match chars.peek().copied() {
        Some((_, '[')) => parse_list(s, chars),
        Some((_, '"')) | Some((_, '\'')) => parse_string(s, chars),
        Some((_, c)) if c == '-' || c.is_ascii_digit() => parse_number(s, chars),
        Some((pos, _)) => parse_keyword(s, chars, pos),
        None => None,
    }
}

fn parse_list(s: &str, chars: &mut Chars) -> Option<Value> {
    chars.next(); // consume '['
    let mut items = Vec::new();
    skip_ws(chars);
    if matches!(chars.peek(), Some((_, ']'))) {
        chars.next();
        return Some(Value::Array(items));
    }
    loop {
        let value = parse_value(s, chars)?;
        items.push(value);
        skip_ws(chars);
        match chars.peek().copied() {
            Some((_, ',')) => {
                chars.next();
                skip_ws(chars);
                if matches!(chars.peek(), Some((_, ']'))) {
                    chars.next();
                    break;
                }
            }
            Some((_, ']')) => {
                chars.next();
                break;
            }
            _ => return None,
        }
    }
    Some(Value::Array(items))
}

fn parse_string(s: &str, chars: &mut Chars) -> Option<Value> {
    let (_, quote) = chars.next()?;
    let mut out = String::new();
    loop {
        let (_, c) = chars.next()?;
        if c == '\\' {
            let (_, escaped) = chars.next()?;
            out.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
        } else if c == quote {
            break;
        } else {
            out.push(c);
        }
    }
    let _ = s;
    Some(Value::String(out))
}

fn parse_number(s: &str, chars: &mut Chars) -> Option<Value> {
    let start = chars.peek()?.0;
    if matches!(chars.peek(), Some((_, '-'))) {
        chars.next();
    }
    let mut end = start + 1;
    let mut is_float = false;
    while let Some((pos, c)) = chars.peek().copied() {
        if c.is_ascii_digit() {
            chars.next();
            end = pos + c.len_utf8();
        } else if c == '.' && !is_float {
            is_float = true;
            chars.next();
            end = pos + c.len_utf8();
        } else {
            break;
        }
    }
    let text = &s[start..end];
    if is_float {
        text.parse::<f64>().ok().map(|v| Value::from(v))
    } else {
        text.parse::<i64>().ok().map(|v| Value::from(v))
    }
}

fn parse_keyword(s: &str, chars: &mut Chars, start: usize) -> Option<Value> {
    let mut end = start;
    while let Some((pos, c)) = chars.peek().copied() {
        if c.is_alphanumeric() || c == '_' {
            chars.next();
            end = pos + c.len_utf8();
        } else {
            break;
        }
    }
    if end == start {
        return None;
    }
    match &s[start..end] {
        "True" | "true" => Some(Value::Bool(true)),
        "False" | "false" => Some(Value::Bool(false)),
        "None" | "null" => Some(Value::Null),
        _ => None,
    }
}

/// Batch-mode entry point: parse a complete plan text and return the ordered
/// task sequence, stopping at the first `join` action and ignoring any
/// trailing text (§4.1, "Batch mode").
pub fn batch_parse(text: &str, registry: &ToolRegistry) -> Result<Vec<Task>> {
    let mut parser = StreamingPlanParser::new(registry);
    let mut tasks = Vec::new();
    for line in text.lines() {
        if let Some(task) = parser.ingest(&format!("{line}\n"))? {
            let is_join = task.is_join();
            tasks.push(task);
            if is_join {
                return Ok(tasks);
            }
        }
    }
    if let Some(task) = parser.finalize()? {
        let is_join = task.is_join();
        tasks.push(task);
        if !is_join {
            // no join action present; nothing further to do
        }
    }
    Ok(tasks)
}

/// Streaming-mode parser: call [`Self::ingest`] as tokens arrive from the LLM
/// and [`Self::finalize`] once the stream ends (§4.1, "Streaming mode").
pub struct StreamingPlanParser<'a> {
    registry: &'a ToolRegistry,
    buffer: String,
    thought: Option<String>,
}

impl<'a> StreamingPlanParser<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self {
            registry,
            buffer: String::new(),
            thought: None,
        }
    }

    /// Append `token` to the internal buffer. On every newline, attempt to
    /// match the completed line against the Thought and Action patterns, in
    /// that order. A matched Thought stores its text and returns `Ok(None)`.
    /// A matched Action returns a fully constructed [`Task`] and clears the
    /// stored thought.
    pub fn ingest(&mut self, token: &str) -> Result<Option<Task>> {
        if let Some(pos) = token.find('\n') {
            let prefix = token[..pos].trim();
            let suffix = &token[pos + 1..];
            self.buffer.push_str(prefix);
            self.buffer.push('\n');
            let matched = self.match_buffer();
            self.buffer = suffix.to_string();
            matched
        } else {
            self.buffer.push_str(token);
            Ok(None)
        }
    }

    /// Append a synthetic newline and perform one last match attempt.
    pub fn finalize(&mut self) -> Result<Option<Task>> {
        self.buffer.push('\n');
        self.match_buffer()
    }

    /// The partially-buffered line, useful for diagnostics when a
    /// tool-hallucination error is raised mid-token (§4.2, step 1 of parse-
    /// error recovery quotes the offending fragment).
    pub fn pending_fragment(&self) -> &str {
        self.buffer.trim()
    }

    fn match_buffer(&mut self) -> Result<Option<Task>> {
        if let Some(caps) = thought_re().captures(&self.buffer) {
            self.thought = Some(caps[1].to_string());
            return Ok(None);
        }
        if let Some(caps) = action_re().captures(&self.buffer) {
            let idx: u32 = caps[1]
                .parse()
                .map_err(|_| CoreError::ParseError(format!("invalid task index: {}", &caps[1])))?;
            let tool_name = caps[2].to_string();
            if tool_name != JOIN_TOOL_NAME && !self.registry.contains(&tool_name) {
                return Err(CoreError::ToolHallucination(tool_name));
            }
            let args = parse_args(&caps[3]);
            let thought = self.thought.take();
            return Ok(Some(Task::new(idx, tool_name, args, thought)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use serde_json::json;
    use std::sync::Arc;

    fn registry_with(names: &[&str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            registry
                .register(Tool::new(
                    *name,
                    format!("{name} tool"),
                    None,
                    Arc::new(|_args| Box::pin(async move { Ok(String::new()) })),
                ))
                .unwrap();
        }
        registry
    }

    #[test]
    fn parses_quoted_string_argument() {
        let args = parse_args("\"$1\"");
        assert_eq!(args, vec![json!("$1")]);
    }

    #[test]
    fn parses_nested_list_argument() {
        let args = parse_args("[\"$1\"], \"hi\"");
        assert_eq!(args, vec![json!(["$1"]), json!("hi")]);
    }

    #[test]
    fn parses_numeric_and_bool_literals() {
        let args = parse_args("42, -3.5, true, None");
        assert_eq!(args, vec![json!(42), json!(-3.5), json!(true), Value::Null]);
    }

    #[test]
    fn falls_back_to_single_raw_argument_on_parse_failure() {
        let args = parse_args("not_a_literal(");
        assert_eq!(args, vec![json!("not_a_literal(")]);
    }

    #[test]
    fn empty_args_yield_empty_vec() {
        let args = parse_args("");
        assert_eq!(args, Vec::<Value>::new());
    }

    #[test]
    fn batch_parse_stops_at_join_and_ignores_trailing_text() {
        let registry = registry_with(&["A", "B"]);
        let text = "1. A()\n2. B(\"$1\")\n3. join()\ntrailing garbage that is not a line\n";
        let tasks = batch_parse(text, &registry).unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks[2].is_join());
    }

    #[test]
    fn thought_line_attaches_to_next_action() {
        let registry = registry_with(&["A"]);
        let text = "Thought: let's start\n1. A()\n";
        let tasks = batch_parse(text, &registry).unwrap();
        assert_eq!(tasks[0].thought.as_deref(), Some("let's start"));
    }

    #[test]
    fn unknown_tool_is_hallucination_error() {
        let registry = registry_with(&["A"]);
        let mut parser = StreamingPlanParser::new(&registry);
        let result = parser.ingest("1. not_a_tool()\n");
        assert!(matches!(result, Err(CoreError::ToolHallucination(name)) if name == "not_a_tool"));
    }

    #[test]
    fn streaming_token_by_token_matches_batch_parse() {
        let registry = registry_with(&["A", "B"]);
        let text = "1. A()\n2. B(\"$1\")\n3. join()\n";
        let batch = batch_parse(text, &registry).unwrap();

        let mut parser = StreamingPlanParser::new(&registry);
        let mut streamed = Vec::new();
        for ch in text.chars() {
            if let Some(task) = parser.ingest(&ch.to_string()).unwrap() {
                streamed.push(task);
            }
        }
        if let Some(task) = parser.finalize().unwrap() {
            streamed.push(task);
        }
        assert_eq!(streamed, batch);
    }

    #[test]
    fn join_always_allowed_even_when_not_registered() {
        let registry = registry_with(&["A"]);
        let mut parser = StreamingPlanParser::new(&registry);
        let result = parser.ingest("1. join()\n").unwrap();
        assert!(result.unwrap().is_join());
    }
}
