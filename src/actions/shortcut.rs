//! Learned shortcuts: named, parameterized sequences of atomic actions.
//!
//! A step's arguments are bound either to one of the shortcut's parameters
//! or to a literal. Models that emit bare values are normalized once, when a
//! proposal is turned into a [`ShortcutDef`]; stored shortcuts are always
//! tagged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use super::atomic::{ActionError, AtomicAction, AtomicKind};

/// Shortcut validation and expansion errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShortcutError {
    #[error("Shortcut name is empty")]
    EmptyName,
    #[error("Shortcut name '{0}' shadows an atomic action")]
    ShadowsAtomic(String),
    #[error("Shortcut '{0}' has no steps")]
    EmptySequence(String),
    #[error("Parameter '{0}' is declared more than once")]
    DuplicateParameter(String),
    #[error("Step {step} references unknown atomic action '{name}'")]
    UnknownAtomic { step: usize, name: String },
    #[error("Step {step} ({action}) binds undeclared parameter '{param}'")]
    UndeclaredParameter {
        step: usize,
        action: String,
        param: String,
    },
    #[error("Step {step} ({action}) has no binding for '{argument}'")]
    MissingBinding {
        step: usize,
        action: String,
        argument: String,
    },
    #[error("Step {step} ({action}) binds unknown argument '{argument}'")]
    UnknownArgument {
        step: usize,
        action: String,
        argument: String,
    },
    #[error("Missing value for shortcut parameter '{0}'")]
    MissingArgument(String),
    #[error("Step {step}: {source}")]
    Action {
        step: usize,
        #[source]
        source: ActionError,
    },
}

/// Where an atomic step's argument comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArgumentBinding {
    /// The value passed for the named shortcut parameter.
    Param { name: String },
    /// A fixed value.
    Literal { value: Value },
}

impl ArgumentBinding {
    pub fn param(name: impl Into<String>) -> Self {
        ArgumentBinding::Param { name: name.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        ArgumentBinding::Literal {
            value: value.into(),
        }
    }

    fn resolve(&self, args: &Map<String, Value>) -> Result<Value, ShortcutError> {
        match self {
            ArgumentBinding::Param { name } => args
                .get(name)
                .cloned()
                .ok_or_else(|| ShortcutError::MissingArgument(name.clone())),
            ArgumentBinding::Literal { value } => Ok(value.clone()),
        }
    }
}

/// One atomic step of a shortcut.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortcutStep {
    pub name: String,
    pub arguments_map: BTreeMap<String, ArgumentBinding>,
}

impl ShortcutStep {
    pub fn new(kind: AtomicKind, bindings: &[(&str, ArgumentBinding)]) -> Self {
        Self {
            name: kind.name().to_string(),
            arguments_map: bindings
                .iter()
                .map(|(arg, binding)| (arg.to_string(), binding.clone()))
                .collect(),
        }
    }

    /// Resolve this step against the shortcut's call arguments.
    pub fn resolve(&self, index: usize, args: &Map<String, Value>) -> Result<AtomicAction, ShortcutError> {
        let kind = AtomicKind::from_name(&self.name).ok_or_else(|| ShortcutError::UnknownAtomic {
            step: index,
            name: self.name.clone(),
        })?;

        let mut resolved = Map::new();
        for (argument, binding) in &self.arguments_map {
            resolved.insert(argument.clone(), binding.resolve(args)?);
        }

        AtomicAction::from_call(kind, &resolved).map_err(|source| ShortcutError::Action {
            step: index,
            source,
        })
    }
}

/// A validated shortcut.
///
/// Deserializing goes through [`ShortcutProposal`], so a stored definition
/// is checked the same way a freshly mined one is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ShortcutProposal")]
pub struct ShortcutDef {
    pub name: String,
    pub arguments: Vec<String>,
    pub description: String,
    pub precondition: String,
    pub atomic_action_sequence: Vec<ShortcutStep>,
}

impl ShortcutDef {
    /// `Name(param, ...): description | Precondition: ...`, as listed in prompts.
    pub fn summary_line(&self) -> String {
        format!(
            "{}({}): {} | Precondition: {}",
            self.name,
            self.arguments.join(", "),
            self.description,
            self.precondition
        )
    }

    /// Resolve every step up front.
    pub fn expand(&self, args: &Map<String, Value>) -> Result<Vec<AtomicAction>, ShortcutError> {
        self.atomic_action_sequence
            .iter()
            .enumerate()
            .map(|(i, step)| step.resolve(i, args))
            .collect()
    }

    /// `Tap_Type_and_Enter(x, y, text)`: the shortcut every fresh store starts with.
    pub fn tap_type_and_enter() -> Self {
        Self {
            name: "Tap_Type_and_Enter".to_string(),
            arguments: vec!["x".to_string(), "y".to_string(), "text".to_string()],
            description: "Tap an input box at position (x, y), Type the \"text\", and then perform the Enter operation. Very useful for searching and sending messages!".to_string(),
            precondition: "There is a text input box on the screen with no previously entered content.".to_string(),
            atomic_action_sequence: vec![
                ShortcutStep::new(
                    AtomicKind::Tap,
                    &[("x", ArgumentBinding::param("x")), ("y", ArgumentBinding::param("y"))],
                ),
                ShortcutStep::new(AtomicKind::Type, &[("text", ArgumentBinding::param("text"))]),
                ShortcutStep::new(AtomicKind::Enter, &[]),
            ],
        }
    }
}

/// The shortcuts a brand-new experience store is seeded with.
pub fn seed_shortcuts() -> BTreeMap<String, ShortcutDef> {
    let seed = ShortcutDef::tap_type_and_enter();
    BTreeMap::from([(seed.name.clone(), seed)])
}

/// A binding as it may appear in model output: tagged, or a bare value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawBinding {
    Tagged(ArgumentBinding),
    Bare(Value),
}

impl RawBinding {
    /// A bare string equal to a declared parameter is a parameter reference;
    /// any other bare value is a literal.
    fn normalize(self, declared: &HashSet<&str>) -> ArgumentBinding {
        match self {
            RawBinding::Tagged(binding) => binding,
            RawBinding::Bare(Value::String(s)) if declared.contains(s.as_str()) => {
                ArgumentBinding::Param { name: s }
            }
            RawBinding::Bare(value) => ArgumentBinding::Literal { value },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    #[serde(alias = "atomic_name")]
    pub name: String,
    #[serde(default)]
    pub arguments_map: Option<BTreeMap<String, RawBinding>>,
}

/// An unvalidated shortcut, as proposed by the miner or read from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ShortcutProposal {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub precondition: String,
    #[serde(default)]
    pub atomic_action_sequence: Vec<RawStep>,
}

impl TryFrom<ShortcutProposal> for ShortcutDef {
    type Error = ShortcutError;

    fn try_from(proposal: ShortcutProposal) -> Result<Self, Self::Error> {
        let name = proposal.name.trim().to_string();
        if name.is_empty() {
            return Err(ShortcutError::EmptyName);
        }
        if AtomicKind::from_name(&name).is_some() {
            return Err(ShortcutError::ShadowsAtomic(name));
        }
        if proposal.atomic_action_sequence.is_empty() {
            return Err(ShortcutError::EmptySequence(name));
        }

        let mut declared = HashSet::new();
        for param in &proposal.arguments {
            if !declared.insert(param.as_str()) {
                return Err(ShortcutError::DuplicateParameter(param.clone()));
            }
        }

        let mut steps = Vec::with_capacity(proposal.atomic_action_sequence.len());
        for (index, raw) in proposal.atomic_action_sequence.into_iter().enumerate() {
            let action = raw.name.trim().to_string();
            let kind = AtomicKind::from_name(&action).ok_or_else(|| ShortcutError::UnknownAtomic {
                step: index,
                name: action.clone(),
            })?;

            let mut arguments_map = BTreeMap::new();
            for (argument, binding) in raw.arguments_map.unwrap_or_default() {
                if !kind.params().contains(&argument.as_str()) {
                    return Err(ShortcutError::UnknownArgument {
                        step: index,
                        action,
                        argument,
                    });
                }
                let binding = binding.normalize(&declared);
                if let ArgumentBinding::Param { name } = &binding {
                    if !declared.contains(name.as_str()) {
                        return Err(ShortcutError::UndeclaredParameter {
                            step: index,
                            action,
                            param: name.clone(),
                        });
                    }
                }
                arguments_map.insert(argument, binding);
            }

            if let Some(missing) = kind
                .params()
                .iter()
                .find(|param| !arguments_map.contains_key(**param))
            {
                return Err(ShortcutError::MissingBinding {
                    step: index,
                    action,
                    argument: missing.to_string(),
                });
            }

            steps.push(ShortcutStep {
                name: action,
                arguments_map,
            });
        }

        Ok(ShortcutDef {
            name,
            arguments: proposal.arguments,
            description: proposal.description.trim().to_string(),
            precondition: proposal.precondition.trim().to_string(),
            atomic_action_sequence: steps,
        })
    }
}
