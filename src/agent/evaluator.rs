//! Outcome-Evaluator: judges the last action from before/after screens.

use super::actor::{keyboard_line, perception_caveat, perception_listing};
use super::sections::{section, section_line};
use super::state::{Outcome, SessionState, NO_ERROR};
use super::unit::{DecisionUnit, ParseError, Role};

/// The evaluator's verdict on one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub error_description: String,
    pub progress_status: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeEvaluator;

impl DecisionUnit for OutcomeEvaluator {
    type Input = SessionState;
    type Output = Evaluation;
    const ROLE: Role = Role::OutcomeEvaluator;

    fn build_prompt(&self, state: &SessionState) -> String {
        let mut prompt = format!("### User Instruction ###\n{}\n\n", state.instruction);
        let progress = if state.progress_status.is_empty() {
            "No progress yet."
        } else {
            state.progress_status.as_str()
        };
        prompt.push_str(&format!("### Progress Status ###\n{}\n\n", progress));
        prompt.push_str(&format!("### Current Subgoal ###\n{}\n\n", state.current_subgoal));

        prompt.push_str("---\n");
        prompt.push_str("The two attached images are two phone screenshots before and after your last action. ");
        prompt.push_str(&perception_caveat(state.width, state.height));
        prompt.push('\n');

        prompt.push_str("### Screen Information Before the Action ###\n");
        prompt.push_str(&perception_listing(&state.perception_pre));
        prompt.push_str(&format!("\nKeyboard status before the action: {}\n\n", keyboard_line(state.keyboard_pre)));

        prompt.push_str("### Screen Information After the Action ###\n");
        prompt.push_str(&perception_listing(&state.perception_post));
        prompt.push_str(&format!("\nKeyboard status after the action: {}\n\n", keyboard_line(state.keyboard_post)));

        prompt.push_str("---\n");
        prompt.push_str("### Latest Action ###\n");
        let action = state
            .last_action
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "None".to_string());
        prompt.push_str(&format!("Action: {}\n", action));
        prompt.push_str(&format!("Expectation: {}\n", state.last_summary));
        if let Some(failure) = &state.last_dispatch_error {
            prompt.push_str(&format!(
                "Execution stopped early. {}. Steps after step {} were not executed.\n",
                failure, failure.step
            ));
        }
        prompt.push('\n');

        prompt.push_str("---\n");
        prompt.push_str("Carefully examine the information provided above to determine whether the last action produced the expected behavior. If the action was successful, update the progress status accordingly. If the action failed, identify the failure mode and provide reasoning on the potential reason causing this failure. Note that for the \"Swipe\" action, it may take multiple attempts to display the expected content. Thus, for a \"Swipe\" action, if the screen shows new content, it usually meets the expectation.\n\n");

        prompt.push_str("Provide your output in the following format containing three parts:\n\n");
        prompt.push_str("### Outcome ###\n");
        prompt.push_str("Choose from the following options. Give your answer as \"A\", \"B\" or \"C\":\n");
        prompt.push_str("A: Successful or Partially Successful. The result of the last action meets the expectation.\n");
        prompt.push_str("B: Failed. The last action results in a wrong page. I need to return to the previous state.\n");
        prompt.push_str("C: Failed. The last action produces no changes.\n\n");
        prompt.push_str("### Error Description ###\n");
        prompt.push_str(&format!(
            "If the action failed, provide a detailed description of the error and the potential reason causing this failure. If the action succeeded, put \"{}\" here.\n\n",
            NO_ERROR
        ));
        prompt.push_str("### Progress Status ###\n");
        prompt.push_str("If the action was successful or partially successful, update the progress status. If the action failed, copy the previous progress status.\n");
        prompt
    }

    fn parse_response(&self, response: &str) -> Result<Evaluation, ParseError> {
        let answer = section_line(response, "Outcome").ok_or(ParseError::MissingSection("Outcome"))?;
        let outcome = Outcome::from_answer(&answer).ok_or(ParseError::InvalidValue {
            section: "Outcome",
            value: answer.clone(),
        })?;
        Ok(Evaluation {
            outcome,
            error_description: section_line(response, "Error Description").unwrap_or_default(),
            progress_status: section(response, "Progress Status").unwrap_or_default(),
        })
    }
}
