//! Post-task curation: mine the finished trace for new shortcuts and tips.
//!
//! Both miners read the whole session, including the full stored experience
//! the orchestrator loads into it after the loop.

use crate::actions::{AtomicKind, ShortcutDef, ShortcutProposal};
use crate::agent::sections::{extract_json, is_none_answer, section};
use crate::agent::{DecisionUnit, Outcome, ParseError, Role, SessionState};

const SHORTCUT_EXAMPLE: &str = r#"{
    "name": "Tap_Type_and_Enter",
    "arguments": ["x", "y", "text"],
    "description": "Tap an input box at position (x, y), Type the \"text\", and then perform the Enter operation (useful for searching or sending messages).",
    "precondition": "There is a text input box on the screen.",
    "atomic_action_sequence": [
        {"name": "Tap", "arguments_map": {"x": {"kind": "param", "name": "x"}, "y": {"kind": "param", "name": "y"}}},
        {"name": "Type", "arguments_map": {"text": {"kind": "param", "name": "text"}}},
        {"name": "Enter", "arguments_map": {}}
    ]
}"#;

fn task_header(state: &SessionState) -> String {
    format!(
        "### Current Task ###\n{}\n\n### Overall Plan ###\n{}\n\n### Progress Status ###\n{}\n\n",
        state.instruction, state.plan, state.progress_status
    )
}

fn full_history(state: &SessionState) -> String {
    let mut text = String::from("### Full Action History ###\n");
    if state.steps() == 0 {
        text.push_str("No actions have been taken yet.\n\n");
        return text;
    }
    for entry in state.history() {
        if entry.outcome == Outcome::A {
            text.push_str(&format!(
                "- Action: {} | Description: {} | Outcome: Successful | Progress: {}\n",
                entry.action, entry.summary, entry.progress_status
            ));
        } else {
            text.push_str(&format!(
                "- Action: {} | Description: {} | Outcome: Failed | Feedback: {}\n",
                entry.action, entry.summary, entry.error_description
            ));
        }
    }
    text.push('\n');
    text
}

fn future_tasks(state: &SessionState) -> String {
    if state.future_tasks.is_empty() {
        return String::new();
    }
    let mut text = String::from("---\n### Future Tasks ###\nHere are some tasks that you might be asked to do in the future:\n");
    for task in &state.future_tasks {
        text.push_str(&format!("- {}\n", task));
    }
    text.push('\n');
    text
}

/// Proposes at most one new shortcut from the session's history.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortcutMiner;

impl DecisionUnit for ShortcutMiner {
    type Input = SessionState;
    /// `None` when the model declines to propose anything.
    type Output = Option<ShortcutDef>;
    const ROLE: Role = Role::ShortcutMiner;

    fn build_prompt(&self, state: &SessionState) -> String {
        let mut prompt = task_header(state);

        prompt.push_str("### Atomic Actions ###\n");
        prompt.push_str("Here are the atomic actions in the format of `name(arguments): description` as follows:\n");
        prompt.push_str(&AtomicKind::catalog(state.width, state.height, true));
        prompt.push('\n');

        prompt.push_str("### Existing Shortcuts from Past Experience ###\n");
        if state.shortcuts.is_empty() {
            prompt.push_str("No shortcuts are provided.\n");
        } else {
            prompt.push_str("Here are some existing shortcuts you have created:\n");
            for shortcut in state.shortcuts.values() {
                prompt.push_str(&format!("- {}\n", shortcut.summary_line()));
            }
        }
        prompt.push('\n');

        prompt.push_str(&full_history(state));
        prompt.push_str(&future_tasks(state));

        prompt.push_str("---\n");
        prompt.push_str("Carefully reflect on the interaction history of the current task. Check if there are any subgoals that are accomplished by a sequence of successful actions and can be consolidated into new \"Shortcuts\" to improve efficiency for future tasks? These shortcuts are subroutines consisting of a series of atomic actions that can be executed under specific preconditions. For example, tap, type and enter text in a search bar or creating a new note in Notes.\n\n");
        prompt.push_str("Provide your output in the following format:\n\n");
        prompt.push_str("### New Shortcut ###\n");
        prompt.push_str("If you decide to create a new shortcut (not already in the existing shortcuts), provide your shortcut object in a valid JSON format which is detailed below. If not, put \"None\" here.\n");
        prompt.push_str("A shortcut object contains the following fields: name, arguments, description, precondition, and atomic_action_sequence. The keys in the arguments need to be unique. The atomic_action_sequence is a list of dictionaries, each containing the name of an atomic action and a mapping of its atomic argument names to bindings. A binding is either {\"kind\": \"param\", \"name\": <shortcut argument name>} or {\"kind\": \"literal\", \"value\": <fixed value>}. If an atomic action in the atomic_action_sequence does not take any arguments, set the `arguments_map` to an empty dict.\n");
        prompt.push_str("IMPORTANT: The shortcut must ONLY include the Atomic Actions listed above. Create a new shortcut only if you are confident it will be useful in the future. Ensure that duplicated shortcuts with overly similar functionality are not included.\n");
        prompt.push_str("PRO TIP: Avoid creating shortcuts with too many arguments, such as involving multiple taps at different positions. All coordinate arguments required for the shortcut should be visible on the current screen. Imagine that when you start executing the shortcut, you are essentially blind.\n");
        prompt.push_str(&format!(
            "Follow the example below to format the shortcut. Avoid adding comments that could cause errors with JSON parsing.\n{}\n",
            SHORTCUT_EXAMPLE
        ));
        prompt
    }

    fn parse_response(&self, response: &str) -> Result<Option<ShortcutDef>, ParseError> {
        let text = section(response, "New Shortcut").ok_or(ParseError::MissingSection("New Shortcut"))?;
        if text.is_empty() || is_none_answer(&text) {
            return Ok(None);
        }
        let proposal: ShortcutProposal =
            extract_json(&text, '{').ok_or(ParseError::MissingJson("New Shortcut"))?;
        Ok(Some(ShortcutDef::try_from(proposal)?))
    }
}

/// Merges new generic tips into the existing corpus.
#[derive(Debug, Clone, Copy, Default)]
pub struct TipMiner;

impl DecisionUnit for TipMiner {
    type Input = SessionState;
    /// `None` leaves the tips unchanged.
    type Output = Option<String>;
    const ROLE: Role = Role::TipMiner;

    fn build_prompt(&self, state: &SessionState) -> String {
        let mut prompt = task_header(state);

        prompt.push_str("### Existing Tips from Past Experience ###\n");
        if state.tips.trim().is_empty() {
            prompt.push_str("No tips recorded.\n\n");
        } else {
            prompt.push_str(&format!("{}\n\n", state.tips.trim()));
        }

        prompt.push_str(&full_history(state));
        prompt.push_str(&future_tasks(state));

        prompt.push_str("---\n");
        prompt.push_str("Carefully reflect on the interaction history of the current task. Check if there are any general tips that might be useful for handling future tasks, such as advice on preventing certain common errors?\n\n");
        prompt.push_str("Provide your output in the following format:\n\n");
        prompt.push_str("### Updated Tips ###\n");
        prompt.push_str("If you have any important new tips to add (not already included in the existing tips), combine them with the current list. If there are no new tips, simply copy the existing tips here. Keep your tips concise and general.\n");
        prompt
    }

    fn parse_response(&self, response: &str) -> Result<Option<String>, ParseError> {
        let tips = section(response, "Updated Tips").ok_or(ParseError::MissingSection("Updated Tips"))?;
        if tips.is_empty() || is_none_answer(&tips) {
            return Ok(None);
        }
        Ok(Some(tips))
    }
}
