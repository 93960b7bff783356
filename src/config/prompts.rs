//! System prompts for each agent role.

use chrono::Local;

use crate::agent::Role;

const PLANNER: &str = "You are a helpful AI assistant for operating mobile phones. Your goal is to track progress and devise high-level plans to achieve the user's requests. Think as if you are a human user operating the phone.";

const ACTOR: &str = "You are a helpful AI assistant for operating mobile phones. Your goal is to choose the correct actions to complete the user's instruction. Think as if you are a human user operating the phone.";

const OUTCOME_EVALUATOR: &str = "You are a helpful AI assistant for operating mobile phones. Your goal is to verify whether the last action produced the expected behavior and to keep track of the overall progress.";

const MEMORY_WRITER: &str = "You are a helpful AI assistant for operating mobile phones. Your goal is to take notes of important content relevant to the user's request.";

const CURATOR: &str = "You are a helpful AI assistant specializing in mobile phone operations. Your goal is to reflect on past experiences and provide insights to improve future interactions.";

const SELECTOR: &str = "You are a helpful AI assistant specializing in mobile phone operations. Your goal is to select relevant past experience to help with a new task.";

/// The system prompt for a role.
pub fn system_prompt(role: Role) -> &'static str {
    match role {
        Role::Planner => PLANNER,
        Role::Actor => ACTOR,
        Role::OutcomeEvaluator => OUTCOME_EVALUATOR,
        Role::MemoryWriter => MEMORY_WRITER,
        Role::ShortcutMiner | Role::TipMiner => CURATOR,
        Role::ShortcutSelector | Role::TipSelector => SELECTOR,
    }
}

/// A one-line date header for prompts that reason about time.
pub fn today_line() -> String {
    format!("Today's date is: {}", Local::now().format("%A, %B %d, %Y"))
}
