//! The Actor's action payload: `{"name": ..., "arguments": {...}}`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::agent::sections::extract_json;

/// Tokens an Actor may emit instead of an action to end the task.
const FINISH_TOKENS: [&str; 5] = ["null", "none", "finish", "exit", "stop"];

/// One action choice, naming an atomic action or a shortcut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDecision {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: Map<String, Value>,
}

impl ActionDecision {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Extract a decision from free-form text. `None` if no usable JSON object is found.
    pub fn parse(text: &str) -> Option<Self> {
        extract_json::<ActionDecision>(text, '{').map(|mut decision| {
            decision.name = decision.name.trim().to_string();
            decision
        })
    }

    /// Whether the name is one of the finish tokens (case-insensitive).
    pub fn is_finish(&self) -> bool {
        is_finish_token(&self.name)
    }
}

impl fmt::Display for ActionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = if self.arguments.is_empty() {
            Value::Null
        } else {
            Value::Object(self.arguments.clone())
        };
        write!(f, "{{\"name\": \"{}\", \"arguments\": {}}}", self.name, args)
    }
}

pub fn is_finish_token(name: &str) -> bool {
    let name = name.trim();
    FINISH_TOKENS.iter().any(|token| name.eq_ignore_ascii_case(token))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}
