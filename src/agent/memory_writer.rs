//! Memory-Writer: keeps durable, instruction-relevant facts across steps.

use super::actor::{perception_caveat, perception_listing};
use super::sections::section;
use super::state::SessionState;
use super::unit::{DecisionUnit, ParseError, Role};

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryWriter;

impl DecisionUnit for MemoryWriter {
    type Input = SessionState;
    /// The full updated notes; merged into the session, never assigned.
    type Output = String;
    const ROLE: Role = Role::MemoryWriter;

    fn build_prompt(&self, state: &SessionState) -> String {
        let mut prompt = format!("### User Instruction ###\n{}\n\n", state.instruction);
        prompt.push_str(&format!("### Overall Plan ###\n{}\n\n", state.plan));
        prompt.push_str(&format!("### Current Subgoal ###\n{}\n\n", state.current_subgoal));
        prompt.push_str(&format!("### Progress Status ###\n{}\n\n", state.progress_status));

        let notes = if state.important_notes().is_empty() {
            "No important notes recorded."
        } else {
            state.important_notes()
        };
        prompt.push_str(&format!("### Existing Important Notes ###\n{}\n\n", notes));

        prompt.push_str("### Current Screen Information ###\n");
        prompt.push_str("The attached image is a screenshot showing the current state of the phone. ");
        prompt.push_str(&perception_caveat(state.width, state.height));
        prompt.push('\n');
        prompt.push_str(&perception_listing(&state.perception_post));
        prompt.push('\n');

        prompt.push_str("---\n");
        prompt.push_str("Carefully examine the information above to identify any important content that needs to be recorded. IMPORTANT: Do not take notes on low-level actions; only keep track of significant textual or visual information relevant to the user's request.\n\n");
        prompt.push_str("Provide your output in the following format:\n");
        prompt.push_str("### Important Notes ###\n");
        prompt.push_str("The updated important notes, combining the old and new ones. If nothing new to record, copy the existing important notes.\n");
        prompt
    }

    fn parse_response(&self, response: &str) -> Result<String, ParseError> {
        section(response, "Important Notes").ok_or(ParseError::MissingSection("Important Notes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_prompt_shows_existing_notes() {
        let mut state = SessionState::new("Find the cheapest flight", "", BTreeMap::new());
        assert!(MemoryWriter.build_prompt(&state).contains("No important notes recorded."));
        state.merge_notes("Flight A costs $120.");
        assert!(MemoryWriter
            .build_prompt(&state)
            .contains("### Existing Important Notes ###\nFlight A costs $120."));
    }

    #[test]
    fn test_identical_response_leaves_notes_unchanged() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        state.merge_notes("Flight A costs $120.");
        let response = "### Important Notes ###\nFlight A costs $120.";

        for _ in 0..3 {
            let notes = MemoryWriter.parse_response(response).unwrap();
            state.merge_notes(&notes);
        }
        assert_eq!(state.important_notes(), "Flight A costs $120.");
    }

    #[test]
    fn test_response_dropping_old_content_is_merged() {
        let mut state = SessionState::new("task", "", BTreeMap::new());
        state.merge_notes("Flight A costs $120.");
        let notes = MemoryWriter
            .parse_response("### Important Notes ###\nFlight B costs $95.")
            .unwrap();
        state.merge_notes(&notes);
        assert!(state.important_notes().contains("Flight A costs $120."));
        assert!(state.important_notes().contains("Flight B costs $95."));
    }
}
