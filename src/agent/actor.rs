//! Actor: picks the next atomic action or shortcut for the current subgoal.

use super::sections::{collapse_whitespace, section, section_line, strip_comments};
use super::state::{Outcome, SessionState};
use super::unit::{DecisionUnit, ParseError, Role};
use crate::actions::{AtomicKind, ShortcutDef};
use crate::device::PerceptionItem;

/// How many recent steps the Actor gets to see.
pub const HISTORY_WINDOW: usize = 5;

/// The Actor's structured reply. `action` is the raw JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorDecision {
    pub thought: String,
    pub action: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Actor;

/// `(coordinates; text)` lines for the informative perception items.
pub fn perception_listing(items: &[PerceptionItem]) -> String {
    items
        .iter()
        .filter(|item| item.is_informative())
        .map(|item| format!("{}; {}\n", item.coordinates, item.text.trim()))
        .collect()
}

/// The standard caveat that precedes perception listings.
pub fn perception_caveat(width: u32, height: u32) -> String {
    format!(
        "The width and height are {} and {} pixels, respectively.\n\
         To help you better understand the content in this screenshot, we have extracted positional information for the text elements and icons. \
         The format is: (coordinates; content). The coordinates are [x, y], where x represents the horizontal pixel position (from left to right) \
         and y represents the vertical pixel position (from top to bottom).\n\
         Note that this information might not be entirely accurate. You should combine it with the screenshot to gain a better understanding.\n",
        width, height
    )
}

pub fn keyboard_line(active: bool) -> &'static str {
    if active {
        "The keyboard has been activated and you can type."
    } else {
        "The keyboard has not been activated and you can't type."
    }
}

fn shortcut_listing<'a>(shortcuts: impl Iterator<Item = &'a ShortcutDef>) -> String {
    shortcuts
        .map(|shortcut| format!("- {}\n", shortcut.summary_line()))
        .collect()
}

impl DecisionUnit for Actor {
    type Input = SessionState;
    type Output = ActorDecision;
    const ROLE: Role = Role::Actor;

    fn build_prompt(&self, state: &SessionState) -> String {
        let mut prompt = format!("### User Instruction ###\n{}\n\n", state.instruction);
        prompt.push_str(&format!("### Overall Plan ###\n{}\n\n", state.plan));

        let progress = if state.progress_status.is_empty() {
            "No progress yet."
        } else {
            state.progress_status.as_str()
        };
        prompt.push_str(&format!("### Progress Status ###\n{}\n\n", progress));
        prompt.push_str(&format!("### Current Subgoal ###\n{}\n\n", state.current_subgoal));

        if !state.important_notes().is_empty() {
            prompt.push_str(&format!("### Important Notes ###\n{}\n\n", state.important_notes()));
        }
        if !state.tips.trim().is_empty() {
            prompt.push_str("### Tips ###\n");
            prompt.push_str("From previous experience interacting with the device, you have collected the following tips that might be useful for deciding what to do next:\n");
            prompt.push_str(&format!("{}\n\n", state.tips.trim()));
        }

        prompt.push_str("### Screen Information ###\n");
        prompt.push_str("The attached image is a screenshot showing the current state of the phone. ");
        prompt.push_str(&perception_caveat(state.width, state.height));
        prompt.push('\n');
        prompt.push_str(&perception_listing(&state.perception_pre));
        prompt.push('\n');
        prompt.push_str(&format!("Keyboard status: {}\n\n", keyboard_line(state.keyboard_pre)));

        prompt.push_str("---\n");
        prompt.push_str("Carefully examine all the information provided above and decide on the next action to perform. If you notice an unsolved error in the previous action, think as a human user and attempt to rectify them. You must choose your action from one of the atomic actions or the shortcuts. The shortcuts are predefined sequences of actions that can be used to speed up the process. Each shortcut has a precondition specifying when it is suitable to use. If you plan to use a shortcut, ensure the current phone state satisfies its precondition first.\n\n");

        prompt.push_str("#### Atomic Actions ####\n");
        prompt.push_str("The atomic action functions are listed in the format of `name(arguments): description` as follows:\n");
        prompt.push_str(&AtomicKind::catalog(state.width, state.height, state.keyboard_pre));
        if !state.keyboard_pre {
            prompt.push_str("NOTE: Unable to type. The keyboard has not been activated. To type, please activate the keyboard by tapping on an input box or using a shortcut, which includes tapping on an input box first.\n");
        }
        prompt.push('\n');

        prompt.push_str("#### Shortcuts ####\n");
        if state.shortcuts.is_empty() {
            prompt.push_str("No shortcuts are available.\n");
        } else {
            prompt.push_str("The shortcut functions are listed in the format of `name(arguments): description | Precondition: precondition` as follows:\n");
            prompt.push_str(&shortcut_listing(state.ranked_shortcuts()));
        }
        prompt.push('\n');

        prompt.push_str("### Latest Action History ###\n");
        if state.steps() == 0 {
            prompt.push_str("No actions have been taken yet.\n\n");
        } else {
            prompt.push_str("Recent actions you took previously and whether they were successful:\n");
            for entry in state.recent_history(HISTORY_WINDOW) {
                if entry.outcome == Outcome::A {
                    prompt.push_str(&format!(
                        "Action: {} | Description: {} | Outcome: Successful\n",
                        entry.action, entry.summary
                    ));
                } else {
                    prompt.push_str(&format!(
                        "Action: {} | Description: {} | Outcome: Failed | Feedback: {}\n",
                        entry.action, entry.summary, entry.error_description
                    ));
                }
            }
            if state.should_hint_scroll() {
                prompt.push_str("\nHINT: If multiple Tap actions failed to make changes to the screen, consider using a \"Swipe\" action to view more content or use another way to achieve the current subgoal.");
            }
            prompt.push_str("\n\n");
        }

        prompt.push_str("---\n");
        prompt.push_str("Provide your output in the following format, which contains three parts:\n");
        prompt.push_str("### Thought ###\n");
        prompt.push_str("Provide a detailed explanation of your rationale for the chosen action. IMPORTANT: If you decide to use a shortcut, first verify that its precondition is met in the current phone state. For example, if the shortcut requires the phone to be at the Home screen, check whether the current screenshot shows the Home screen. If not, perform the appropriate atomic actions instead.\n\n");
        prompt.push_str("### Action ###\n");
        prompt.push_str("Choose only one action or shortcut from the options provided. IMPORTANT: Do NOT return invalid actions like null or stop. Do NOT repeat previously failed actions.\n");
        prompt.push_str("Use shortcuts whenever possible to expedite the process, but make sure that the precondition is met.\n");
        prompt.push_str("You must provide your decision using a valid JSON format specifying the name and arguments of the action. For example, if you choose to tap at position (100, 200), you should write {\"name\":\"Tap\", \"arguments\":{\"x\":100, \"y\":200}}. If an action does not require arguments, such as Home, fill in null to the \"arguments\" field. Ensure that the argument keys match the action function's signature exactly.\n\n");
        prompt.push_str("### Description ###\n");
        prompt.push_str("A brief description of the chosen action and the expected outcome.");
        prompt
    }

    fn parse_response(&self, response: &str) -> Result<ActorDecision, ParseError> {
        let action = section(response, "Action")
            .map(|text| collapse_whitespace(&strip_comments(&text)))
            .filter(|text| !text.is_empty())
            .ok_or(ParseError::MissingSection("Action"))?;
        Ok(ActorDecision {
            thought: section_line(response, "Thought").unwrap_or_default(),
            action,
            description: section_line(response, "Description").unwrap_or_default(),
        })
    }
}
