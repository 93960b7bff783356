//! Action dispatcher: turns an Actor decision into device input.

use std::thread;

use super::atomic::{ActionError, AtomicAction, AtomicKind};
use super::decision::ActionDecision;
use super::shortcut::ShortcutError;
use crate::agent::{DispatchFailure, SessionState};
use crate::device::{DeviceController, PerceptionItem};

/// What the dispatcher did with one decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// A single atomic action ran, or failed before touching the device.
    Atomic {
        decision: ActionDecision,
        error: Option<ActionError>,
    },
    /// A shortcut expanded; `executed` steps completed before `failure`, if any.
    Shortcut {
        decision: ActionDecision,
        executed: usize,
        failure: Option<DispatchFailure>,
    },
    /// The Actor chose to end the task.
    Finish,
    /// The name is neither an atomic action, a shortcut nor a finish token.
    Invalid { name: String },
    /// No `{name, arguments}` object could be extracted.
    Unparseable,
}

impl Dispatched {
    /// Number of atomic actions that reached the device.
    pub fn executed_count(&self) -> usize {
        match self {
            Dispatched::Atomic { error: None, .. } => 1,
            Dispatched::Shortcut { executed, .. } => *executed,
            _ => 0,
        }
    }

    /// The decision that was acted on, for atomic actions and shortcuts.
    pub fn decision(&self) -> Option<&ActionDecision> {
        match self {
            Dispatched::Atomic { decision, .. } | Dispatched::Shortcut { decision, .. } => {
                Some(decision)
            }
            _ => None,
        }
    }

    /// The failure to surface to the evaluator.
    pub fn failure(&self) -> Option<DispatchFailure> {
        match self {
            Dispatched::Atomic {
                decision,
                error: Some(error),
            } => Some(DispatchFailure {
                step: 0,
                action: decision.name.clone(),
                message: error.to_string(),
            }),
            Dispatched::Shortcut { failure, .. } => failure.clone(),
            _ => None,
        }
    }
}

/// Executes Actor decisions against a device.
///
/// Each atomic action is followed by its settle delay, scaled by
/// `settle_scale`. A scale of 0 disables waiting.
#[derive(Debug, Clone)]
pub struct ActionHandler {
    settle_scale: f64,
}

impl Default for ActionHandler {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ActionHandler {
    pub fn new(settle_scale: f64) -> Self {
        Self {
            settle_scale: settle_scale.max(0.0),
        }
    }

    pub fn settle_scale(&self) -> f64 {
        self.settle_scale
    }

    /// Parse and run the Actor's action text.
    ///
    /// Never fails: device and argument errors are reported in the result.
    /// Only a finish token mutates `state` (it sets `finish_thought`).
    pub fn execute<D: DeviceController + ?Sized>(
        &self,
        device: &D,
        action_text: &str,
        state: &mut SessionState,
    ) -> Dispatched {
        let Some(decision) = ActionDecision::parse(action_text) else {
            tracing::warn!(action = action_text, "Could not parse action payload");
            return Dispatched::Unparseable;
        };

        if let Some(kind) = AtomicKind::from_name(&decision.name) {
            tracing::info!(action = %decision, "Executing atomic action");
            let error = AtomicAction::from_call(kind, &decision.arguments)
                .and_then(|action| self.run_atomic(device, &action, &state.perception_pre))
                .err();
            if let Some(e) = &error {
                tracing::warn!(action = %decision.name, "Atomic action failed: {}", e);
            }
            return Dispatched::Atomic { decision, error };
        }

        if let Some(shortcut) = state.shortcuts.get(&decision.name) {
            tracing::info!(shortcut = %decision.name, "Executing shortcut");
            let mut failure = None;
            let mut executed = 0;
            for (index, step) in shortcut.atomic_action_sequence.iter().enumerate() {
                let result = step.resolve(index, &decision.arguments).and_then(|action| {
                    tracing::debug!(step = index, action = %action, "Executing sub-step");
                    self.run_atomic(device, &action, &state.perception_pre)
                        .map_err(|source| ShortcutError::Action { step: index, source })
                });
                if let Err(e) = result {
                    tracing::warn!(shortcut = %decision.name, step = index, "Shortcut aborted: {}", e);
                    failure = Some(DispatchFailure {
                        step: index,
                        action: step.name.clone(),
                        message: e.to_string(),
                    });
                    break;
                }
                executed += 1;
            }
            return Dispatched::Shortcut {
                decision,
                executed,
                failure,
            };
        }

        if decision.is_finish() {
            tracing::info!(action = %decision.name, "Actor chose to finish the task");
            state.finish_thought = state.last_action_thought.clone();
            return Dispatched::Finish;
        }

        tracing::warn!(action = %decision.name, "Invalid action name");
        Dispatched::Invalid {
            name: decision.name,
        }
    }

    /// Run one atomic action and wait for the screen to settle.
    pub fn run_atomic<D: DeviceController + ?Sized>(
        &self,
        device: &D,
        action: &AtomicAction,
        screen: &[PerceptionItem],
    ) -> Result<(), ActionError> {
        match action {
            AtomicAction::OpenApp { app_name } => self.handle_open_app(device, app_name, screen)?,
            AtomicAction::Tap { x, y } => device.tap(*x, *y)?,
            AtomicAction::Swipe { x1, y1, x2, y2 } => device.swipe(*x1, *y1, *x2, *y2)?,
            AtomicAction::Type { text } => device.type_text(text)?,
            AtomicAction::Enter => device.enter()?,
            AtomicAction::SwitchApp => device.switch_app()?,
            AtomicAction::Back => device.back()?,
            AtomicAction::Home => device.home()?,
            AtomicAction::Wait => {}
        }
        self.settle(action.kind());
        Ok(())
    }

    /// Tap the app whose label matches exactly on the current screen.
    fn handle_open_app<D: DeviceController + ?Sized>(
        &self,
        device: &D,
        app_name: &str,
        screen: &[PerceptionItem],
    ) -> Result<(), ActionError> {
        let label = screen
            .iter()
            .find(|item| item.text.trim() == app_name)
            .ok_or_else(|| ActionError::AppNotFound(app_name.to_string()))?;
        let (x, y) = label.app_icon_point();
        device.tap(x, y)?;
        Ok(())
    }

    fn settle(&self, kind: AtomicKind) {
        if self.settle_scale > 0.0 {
            thread::sleep(kind.settle_delay().mul_f64(self.settle_scale));
        }
    }
}
