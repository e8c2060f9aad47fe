//! Planner system prompt assembly (§4.2, "Prompt assembly").
//!
//! The prompt has a fixed skeleton: a preamble naming the registered tools
//! plus the synthetic `join()` entry, a fixed Guidelines block, any
//! tool-conditional clauses the configuration enumerates, optional
//! user-supplied free text, replan-only clauses, and a closing block of
//! few-shot examples.

use llm_compiler_core::tool::ToolRegistry;

/// The synthetic `join()` tool description appended after every registered
/// tool. `join` is never in the registry (it's recognized structurally by
/// the parser), so the prompt has to spell it out by hand.
pub const JOIN_DESCRIPTION: &str = "join():\n\
 - Collects and combines results from prior actions.\n\
 - An agent is called upon invoking join to either finalize the answer or signal that the plan must be replanned.\n\
 - join should always be the last action in the plan, and is called in two scenarios:\n\
   (a) the answer can be determined by gathering the outputs from prior tasks, or\n\
   (b) the answer cannot be determined until the plan's tasks have executed.";

const GUIDELINES_HEADER: &str = "Guidelines:\n\
 - Each action described above contains input/output types and a description.\n\
    - You must strictly adhere to the input and output types for each action.\n\
 - Each action in the plan should strictly be one of the above types.\n\
 - Each action MUST have a unique ID, which is strictly increasing.\n\
 - Inputs for actions can either be constants or outputs from preceding actions. In the latter case, use the format $id to denote the ID of the previous action whose output will be the input.\n";

/// A single tool-conditional clause (§4.2 point 3): a set of tool names and
/// the instruction appended to the prompt when every name in the set is
/// present in the registry. The full list lives in configuration, not in
/// code, so new clauses don't require a rebuild of this module.
#[derive(Debug, Clone)]
pub struct ToolConditionalClause {
    pub requires: Vec<String>,
    pub instruction: String,
}

impl ToolConditionalClause {
    pub fn new(requires: impl IntoIterator<Item = impl Into<String>>, instruction: impl Into<String>) -> Self {
        Self {
            requires: requires.into_iter().map(Into::into).collect(),
            instruction: instruction.into(),
        }
    }

    fn applies(&self, registry: &ToolRegistry) -> bool {
        self.requires.iter().all(|name| registry.contains(name))
    }
}

/// Few-shot example blocks, kept separate for the initial and replan prompt
/// variants (§4.2 point 6).
#[derive(Debug, Clone, Default)]
pub struct FewShotExamples {
    pub initial: String,
    pub replan: String,
}

/// Build the planner's system prompt.
///
/// `end_of_plan_token` is the literal the planner is told to emit (and the
/// LLM is given as a stop sequence); it is interpolated into the Guidelines
/// block so the two stay in sync with configuration.
pub fn build_system_prompt(
    registry: &ToolRegistry,
    conditional_clauses: &[ToolConditionalClause],
    custom_instructions: &str,
    examples: &FewShotExamples,
    end_of_plan_token: &str,
    is_replan: bool,
) -> String {
    let tools: Vec<_> = registry.iter_in_order().collect();
    let mut prompt = format!(
        "Given a user query, create a plan to solve it with the utmost parallelizability. \
Each plan should comprise an action from the following {} types:\n",
        tools.len() + 1
    );

    for (i, tool) in tools.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, tool.description));
    }
    prompt.push_str(&format!("{}. {}\n\n", tools.len() + 1, JOIN_DESCRIPTION));

    prompt.push_str(GUIDELINES_HEADER);
    prompt.push_str(&format!(" - Always call join as the last action in the plan. Say '{end_of_plan_token}' after you call join.\n"));
    prompt.push_str(" - Ensure the plan maximizes parallelizability.\n");
    prompt.push_str(" - Only use the provided actions. Never introduce new actions other than the ones provided.\n\n");

    for clause in conditional_clauses {
        if clause.applies(registry) {
            prompt.push_str(&clause.instruction);
            prompt.push('\n');
        }
    }
    if !conditional_clauses.is_empty() {
        prompt.push('\n');
    }

    if !custom_instructions.is_empty() {
        prompt.push_str(custom_instructions);
        prompt.push_str("\n\n");
    }

    if is_replan {
        prompt.push_str(
            " - You are given \"Previous Plan\" which is the plan that the previous agent created along with the execution \
results (given as Observation) of each task and a general thought (given as Thought) about the executed results. \
You MUST use this information to create the next plan.\n\
 - When starting the next plan, begin with a \"Thought\" that outlines the strategy for the new plan.\n\
 - Never repeat an action that has already been executed in the Previous Plan.\n",
        );
    }

    prompt.push_str("Here are some examples:\n\n");
    prompt.push_str(if is_replan { &examples.replan } else { &examples.initial });
    prompt
}

/// The human turn for one planner invocation (§4.2, "The human prompt").
pub fn build_human_prompt(query: &str, context: Option<&str>) -> String {
    match context {
        Some(context) if !context.is_empty() => format!("Question: {query}\n{context}\n"),
        _ => format!("Question: {query}"),
    }
}
