//! The decision-unit abstraction shared by every model-backed role.

use std::fmt;
use thiserror::Error;

use crate::actions::ShortcutError;
use crate::config::system_prompt;
use crate::model::{ChatModel, ChatRequest, ModelError};

/// The role a model call is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Planner,
    Actor,
    OutcomeEvaluator,
    MemoryWriter,
    ShortcutMiner,
    TipMiner,
    ShortcutSelector,
    TipSelector,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Actor => "actor",
            Role::OutcomeEvaluator => "outcome_evaluator",
            Role::MemoryWriter => "memory_writer",
            Role::ShortcutMiner => "shortcut_miner",
            Role::TipMiner => "tip_miner",
            Role::ShortcutSelector => "shortcut_selector",
            Role::TipSelector => "tip_selector",
        }
    }

    pub fn system_prompt(self) -> &'static str {
        system_prompt(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response that does not satisfy its role's contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Missing section '### {0} ###'")]
    MissingSection(&'static str),
    #[error("Section '{section}' has an invalid value: {value}")]
    InvalidValue { section: &'static str, value: String },
    #[error("No JSON found in section '{0}'")]
    MissingJson(&'static str),
    #[error("Rejected shortcut proposal: {0}")]
    InvalidShortcut(#[from] ShortcutError),
}

/// Why consulting a unit produced no decision.
#[derive(Error, Debug)]
pub enum UnitError {
    #[error("Model call failed: {0}")]
    Model(#[from] ModelError),
    #[error("Unusable response: {0}")]
    Parse(#[from] ParseError),
}

/// A role-specialized step: build a prompt from its input, parse the reply.
///
/// Units are pure; the orchestrator decides what to do with their output.
pub trait DecisionUnit {
    type Input;
    type Output;
    const ROLE: Role;

    fn build_prompt(&self, input: &Self::Input) -> String;

    fn parse_response(&self, response: &str) -> Result<Self::Output, ParseError>;
}

/// Make one model call for `unit` and parse the reply.
pub async fn consult<U, M>(
    model: &M,
    unit: &U,
    input: &U::Input,
    images: Vec<String>,
) -> Result<U::Output, UnitError>
where
    U: DecisionUnit,
    M: ChatModel + ?Sized,
{
    let prompt = unit.build_prompt(input);
    let request = ChatRequest::new(U::ROLE, prompt).with_images(images);
    let response = model.complete(request).await?;
    tracing::debug!(role = U::ROLE.as_str(), response = %response, "Model responded");
    unit.parse_response(&response).map_err(|e| {
        tracing::warn!(role = U::ROLE.as_str(), "Could not parse response: {}", e);
        UnitError::Parse(e)
    })
}
