//! Pre-task retrieval: pick the stored shortcuts and tips relevant to a new instruction.

use crate::agent::sections::{extract_json, is_none_answer, section};
use crate::agent::{DecisionUnit, ParseError, Role};
use crate::experience::Experience;

/// What the selectors look at.
#[derive(Debug, Clone)]
pub struct ExperienceQuery {
    pub instruction: String,
    pub experience: Experience,
}

impl ExperienceQuery {
    pub fn new(instruction: impl Into<String>, experience: Experience) -> Self {
        Self {
            instruction: instruction.into(),
            experience,
        }
    }
}

/// Returns the names of relevant shortcuts, most relevant first.
///
/// Names the store does not know are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortcutSelector;

impl DecisionUnit for ShortcutSelector {
    type Input = ExperienceQuery;
    type Output = Vec<String>;
    const ROLE: Role = Role::ShortcutSelector;

    fn build_prompt(&self, query: &ExperienceQuery) -> String {
        let mut prompt = String::from("### Existing Shortcuts from Past Experience ###\n");
        for shortcut in query.experience.shortcuts.values() {
            prompt.push_str(&format!(
                "- Name: {} | Description: {}\n",
                shortcut.name, shortcut.description
            ));
        }
        prompt.push('\n');
        prompt.push_str(&format!("### Current Task ###\n{}\n\n", query.instruction));
        prompt.push_str("---\n");
        prompt.push_str("Carefully examine the information provided above to pick the shortcuts that can be helpful to the current task. Remove shortcuts that are irrelevant to the current task.\n");
        prompt.push_str("Provide your output in the following format:\n\n");
        prompt.push_str("### Selected Shortcuts ###\n");
        prompt.push_str("Provide your answer as a list of selected shortcut names: [\"shortcut1\", \"shortcut2\", ...]. If there are no relevant shortcuts, put \"None\" here.\n");
        prompt
    }

    /// Lenient: "None" or an unreadable list both select nothing.
    fn parse_response(&self, response: &str) -> Result<Vec<String>, ParseError> {
        let Some(text) = section(response, "Selected Shortcuts") else {
            return Ok(Vec::new());
        };
        if is_none_answer(&text) {
            return Ok(Vec::new());
        }
        Ok(extract_json::<Vec<String>>(&text, '[')
            .unwrap_or_default()
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }
}

/// Returns the subset of tips relevant to the instruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TipSelector;

impl DecisionUnit for TipSelector {
    type Input = ExperienceQuery;
    type Output = String;
    const ROLE: Role = Role::TipSelector;

    fn build_prompt(&self, query: &ExperienceQuery) -> String {
        let mut prompt = format!(
            "### Existing Tips from Past Experience ###\n{}\n\n",
            query.experience.tips.trim()
        );
        prompt.push_str(&format!("### Current Task ###\n{}\n\n", query.instruction));
        prompt.push_str("---\n");
        prompt.push_str("Carefully examine the information provided above to pick the tips that can be helpful to the current task. Remove tips that are irrelevant to the current task.\n");
        prompt.push_str("Provide your output in the following format:\n\n");
        prompt.push_str("### Selected Tips ###\n");
        prompt.push_str("Tips that are generally useful and relevant to the current task. Feel free to reorganize the bullets. If there are no relevant tips, put \"None\" here.\n");
        prompt
    }

    fn parse_response(&self, response: &str) -> Result<String, ParseError> {
        let tips = section(response, "Selected Tips").ok_or(ParseError::MissingSection("Selected Tips"))?;
        if is_none_answer(&tips) {
            return Ok(String::new());
        }
        Ok(tips)
    }
}
