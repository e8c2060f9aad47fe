//! The Joinner (C5): decides whether the current transcript answers the
//! query, or whether the plan needs another round (§4.4).

use llm::chat::{ChatModel, ChatRequest, Message};

use crate::error::{OrchestratorError, Result};

/// The sentinel the summarizer tool uses to signal that the joinner's
/// `Finish` message should be replaced by a cached out-of-band summary
/// string rather than the literal text between the parentheses (§4.4).
pub const SUMMARY_RESULT: &str = "SUMMARY_RESULT";

const FINISH_KEYWORD: &str = "Finish";
const REPLAN_KEYWORD: &str = "Replan";

const RULES: &str = "Follow these rules:\n\
 - You MUST only output either Finish or Replan, or you WILL BE PENALIZED.\n\
 - If you need to answer a knowledge question, answer it directly using 'Action: Finish(<your answer>)'.\n\
 - If you need to return the result of a summary, you MUST use 'Action: Finish(SUMMARY_RESULT)'.\n\
 - If there is an error in one of the tool calls and it is not fixable, provide a user-friendly error message using 'Action: Finish(<your error message>)'.\n\
 - If the plan is not complete yet, or an error in the plan is fixable, output 'Action: Replan'.\n\
 - If the plan is fixable, a transcript entry will contain the phrase 'try again'. If you don't see this phrase, the error is NOT fixable and you MUST output 'Action: Finish(<your error message>)' instead.\n";

const FINAL_ROUND_NOTE: &str = "\nThis is the final round: you cannot Replan. You MUST output 'Action: Finish(<message>)'.\n";

const EXAMPLES: &str = "\nHere are some examples:\n\n\
Question: What is the content of the Apple meeting notes?\n\
get_note_content(\"Apple Meeting\")\n\
Observation: The meeting is about the new iPhone release.\n\
Thought: I can just answer the question directly.\n\
Action: Finish(The meeting is about the new iPhone release.)\n\
###\n\
Question: Say hi to Sid via SMS.\n\
join()\n\
Observation: plan generation stopped due to error in tool `get_contact_info`; error: tool 'get_contact_info' is not registered. You MUST correct this error and try again.\n\
Thought: The error is fixable, so I need to replan.\n\
Action: Replan\n\
###\n\
Question: Compose a new email to John.\n\
compose_new_email([\"john@doe.com\"], [], \"Update\", \"Please see attached.\", [])\n\
Observation: Error: the mail server rejected the request.\n\
Thought: This error is not fixable by replanning. I need to provide a user-friendly error message.\n\
Action: Finish(There was an error sending the email. Please try again later.)\n";

/// Build the joinner's fixed system prompt. `is_final_round` selects the
/// restricted variant that forbids `Replan` (§4.4, "On the final round").
pub fn system_prompt(is_final_round: bool) -> String {
    let mut prompt = RULES.to_string();
    if is_final_round {
        prompt.push_str(FINAL_ROUND_NOTE);
    }
    prompt.push_str(EXAMPLES);
    prompt
}

/// The joinner's structured decision (§4.4, "Contract").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDecision {
    Finish(String),
    Replan,
}

/// Run the joinner once: build its prompt, invoke the model non-streaming,
/// and parse the decision out of the response.
pub async fn join(
    model: &dyn ChatModel,
    query: &str,
    transcript: &str,
    is_final_round: bool,
    cached_summary: Option<&str>,
) -> Result<JoinDecision> {
    let request = ChatRequest::new(vec![
        Message::system(system_prompt(is_final_round)),
        Message::human(format!("Question: {query}\n\n{transcript}\n")),
    ]);
    let response = model.chat(request).await.map_err(OrchestratorError::Llm)?;
    Ok(parse_decision(&response.content, cached_summary))
}

/// Parse a joinner response into a decision (§4.4, "Parsing").
///
/// A malformed response (no recognizable `Action:` line) is treated as
/// `Finish("")` per §4.4, "A malformed response is treated as `Finish("")`".
pub fn parse_decision(response: &str, cached_summary: Option<&str>) -> JoinDecision {
    for line in response.lines() {
        let line = line.trim();
        let Some(action) = line.strip_prefix("Action:") else { continue };
        let action = action.trim();
        if action == REPLAN_KEYWORD {
            return JoinDecision::Replan;
        }
        if let Some(message) = extract_finish_message(action) {
            if message.trim() == SUMMARY_RESULT {
                return JoinDecision::Finish(cached_summary.unwrap_or_default().to_string());
            }
            return JoinDecision::Finish(message);
        }
    }
    JoinDecision::Finish(String::new())
}

/// Extract the argument of `Finish(...)` using balanced-paren matching
/// rather than locating the last `)`, which is lossy when the message itself
/// contains a closing paren (§9, "Joinner message extraction").
fn extract_finish_message(action: &str) -> Option<String> {
    let rest = action.strip_prefix(FINISH_KEYWORD)?;
    let rest = rest.trim_start();
    let mut chars = rest.char_indices();
    let (open_pos, open_char) = chars.next()?;
    if open_char != '(' {
        return None;
    }
    let mut depth = 1i32;
    for (pos, c) in chars {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(rest[open_pos + 1..pos].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
