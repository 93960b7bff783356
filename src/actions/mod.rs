//! Atomic actions, learned shortcuts and the dispatcher that runs them.

mod atomic;
mod decision;
mod handler;
mod shortcut;

pub use atomic::{ActionError, AtomicAction, AtomicKind};
pub use decision::{is_finish_token, ActionDecision};
pub use handler::{ActionHandler, Dispatched};
pub use shortcut::{
    seed_shortcuts, ArgumentBinding, RawBinding, RawStep, ShortcutDef, ShortcutError,
    ShortcutProposal, ShortcutStep,
};
