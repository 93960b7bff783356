//! Planner: decomposes the instruction into subgoals and tracks which one is current.
//!
//! The first call (empty plan) writes the initial plan. Later calls reaffirm or
//! revise it and either keep the current subgoal, move to the next one, or
//! declare the task done with [`DONE_SENTINEL`]. When the session is flagged
//! as stuck, the prompt carries the recent failed attempts as evidence.

use super::sections::{section, section_line};
use super::state::{SessionState, DONE_SENTINEL};
use super::unit::{DecisionUnit, ParseError, Role};
use crate::config::today_line;

/// The Planner's structured reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerDecision {
    pub thought: String,
    pub plan: String,
    pub current_subgoal: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Planner;

impl Planner {
    fn shortcut_section(state: &SessionState) -> String {
        if state.shortcuts.is_empty() {
            return String::new();
        }
        let mut section = String::from("### Available Shortcuts from Past Experience ###\n");
        section.push_str("We additionally provide some shortcut functionalities based on past experience. These shortcuts are predefined sequences of operations that might make the plan more efficient. Each shortcut includes a precondition specifying when it is suitable for use. If your plan implies the use of certain shortcuts, ensure that the precondition is fulfilled before using them. Note that you don't necessarily need to include the names of these shortcuts in your high-level plan; they are provided only as a reference.\n");
        for shortcut in state.ranked_shortcuts() {
            section.push_str(&format!(
                "- {}: {} | Precondition: {}\n",
                shortcut.name, shortcut.description, shortcut.precondition
            ));
        }
        section.push('\n');
        section
    }

    fn stuck_section(state: &SessionState) -> String {
        let mut section = String::from("### Potentially Stuck! ###\n");
        section.push_str("You have encountered several failed attempts. Here are some logs:\n");
        for entry in state.recent_history(state.err_to_manager_thresh) {
            section.push_str(&format!(
                "- Attempt: Action: {} | Description: {} | Outcome: Failed | Feedback: {}\n",
                entry.action, entry.summary, entry.error_description
            ));
        }
        section.push('\n');
        section
    }
}

impl DecisionUnit for Planner {
    type Input = SessionState;
    type Output = PlannerDecision;
    const ROLE: Role = Role::Planner;

    fn build_prompt(&self, state: &SessionState) -> String {
        let mut prompt = format!("{}\n\n", today_line());
        prompt.push_str(&format!("### User Instruction ###\n{}\n\n", state.instruction));

        if state.plan.is_empty() {
            prompt.push_str("---\n");
            prompt.push_str("Think step by step and make a high-level plan to achieve the user's instruction. If the request is complex, break it down into subgoals. If the request involves exploration, include concrete subgoals to quantify the investigation steps. The screenshot displays the starting state of the phone.\n\n");
            prompt.push_str(&Self::shortcut_section(state));
            prompt.push_str("---\n");
            prompt.push_str("Provide your output in the following format which contains three parts:\n\n");
            prompt.push_str("### Thought ###\nA detailed explanation of your rationale for the plan and subgoals.\n\n");
            prompt.push_str("### Plan ###\n1. first subgoal\n2. second subgoal\n...\n\n");
            prompt.push_str("### Current Subgoal ###\nThe first subgoal you should work on.\n");
            return prompt;
        }

        prompt.push_str(&format!("### Current Plan ###\n{}\n\n", state.plan));
        prompt.push_str(&format!("### Previous Subgoal ###\n{}\n\n", state.current_subgoal));
        let progress = if state.progress_status.is_empty() {
            "No progress yet."
        } else {
            state.progress_status.as_str()
        };
        prompt.push_str(&format!("### Progress Status ###\n{}\n\n", progress));
        let notes = if state.important_notes().is_empty() {
            "No important notes recorded."
        } else {
            state.important_notes()
        };
        prompt.push_str(&format!("### Important Notes ###\n{}\n\n", notes));

        if state.error_flag_plan() {
            prompt.push_str(&Self::stuck_section(state));
        }

        prompt.push_str("---\n");
        prompt.push_str("The sections above provide an overview of the plan you are following, the current subgoal you are working on, the overall progress made, and any important notes you have recorded. The screenshot displays the current state of the phone.\n");
        prompt.push_str(&format!(
            "Carefully assess the current status to determine if the task has been fully completed. If the user's request involves exploration, ensure you have conducted sufficient investigation. If you are confident that no further actions are required, mark the task as \"{}\" in your output. If the task is not finished, outline the next steps. If you are stuck with errors, think step by step about whether the overall plan needs to be revised to address the error.\n",
            DONE_SENTINEL
        ));
        prompt.push_str("NOTE: If the current situation prevents proceeding with the original plan or requires clarification from the user, make reasonable assumptions and revise the plan accordingly. Act as though you are the user in such cases.\n\n");
        prompt.push_str(&Self::shortcut_section(state));
        prompt.push_str("---\n");
        prompt.push_str("Provide your output in the following format, which contains three parts:\n\n");
        prompt.push_str("### Thought ###\nProvide a detailed explanation of your rationale for the plan and subgoals.\n\n");
        prompt.push_str("### Plan ###\nIf an update is required for the high-level plan, provide the updated plan here. Otherwise, keep the current plan and copy it here.\n\n");
        prompt.push_str(&format!(
            "### Current Subgoal ###\nThe next subgoal to work on. If the previous subgoal is not yet complete, copy it here. If all subgoals are completed, write \"{}\".\n",
            DONE_SENTINEL
        ));
        prompt
    }

    fn parse_response(&self, response: &str) -> Result<PlannerDecision, ParseError> {
        let thought = section_line(response, "Thought").unwrap_or_default();
        let plan = section(response, "Plan").ok_or(ParseError::MissingSection("Plan"))?;
        let current_subgoal = section_line(response, "Current Subgoal")
            .ok_or(ParseError::MissingSection("Current Subgoal"))?;
        if current_subgoal.is_empty() {
            return Err(ParseError::InvalidValue {
                section: "Current Subgoal",
                value: String::new(),
            });
        }
        Ok(PlannerDecision {
            thought,
            plan,
            current_subgoal,
        })
    }
}
