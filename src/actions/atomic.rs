//! The fixed registry of atomic actions.

use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::device::DeviceError;

/// Errors raised while resolving or running a single atomic action.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Unknown atomic action: {0}")]
    UnknownAtomic(String),
    #[error("Missing required parameter '{param}' for {action}")]
    MissingParameter { action: &'static str, param: &'static str },
    #[error("Invalid value for '{param}' of {action}: {value}")]
    InvalidArgument {
        action: &'static str,
        param: &'static str,
        value: String,
    },
    #[error("App not found on screen: {0}")]
    AppNotFound(String),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Names of the atomic actions, in the order they are offered to the Actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicKind {
    OpenApp,
    Tap,
    Swipe,
    Type,
    Enter,
    SwitchApp,
    Back,
    Home,
    Wait,
}

impl AtomicKind {
    pub const ALL: [AtomicKind; 9] = [
        AtomicKind::OpenApp,
        AtomicKind::Tap,
        AtomicKind::Swipe,
        AtomicKind::Type,
        AtomicKind::Enter,
        AtomicKind::SwitchApp,
        AtomicKind::Back,
        AtomicKind::Home,
        AtomicKind::Wait,
    ];

    /// The name the model uses for this action.
    pub fn name(self) -> &'static str {
        match self {
            AtomicKind::OpenApp => "Open_App",
            AtomicKind::Tap => "Tap",
            AtomicKind::Swipe => "Swipe",
            AtomicKind::Type => "Type",
            AtomicKind::Enter => "Enter",
            AtomicKind::SwitchApp => "Switch_App",
            AtomicKind::Back => "Back",
            AtomicKind::Home => "Home",
            AtomicKind::Wait => "Wait",
        }
    }

    /// Ordered parameter names.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            AtomicKind::OpenApp => &["app_name"],
            AtomicKind::Tap => &["x", "y"],
            AtomicKind::Swipe => &["x1", "y1", "x2", "y2"],
            AtomicKind::Type => &["text"],
            _ => &[],
        }
    }

    /// Exact-name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the action can only be offered while the keyboard is shown.
    pub fn requires_keyboard(self) -> bool {
        matches!(self, AtomicKind::Type)
    }

    /// How long the screen needs to settle after this action.
    pub fn settle_delay(self) -> Duration {
        let secs = match self {
            AtomicKind::OpenApp | AtomicKind::Enter | AtomicKind::Wait => 10,
            AtomicKind::Tap | AtomicKind::Swipe => 5,
            AtomicKind::Type | AtomicKind::Back | AtomicKind::Home | AtomicKind::SwitchApp => 3,
        };
        Duration::from_secs(secs)
    }

    /// `Name(param, ...)`.
    pub fn signature(self) -> String {
        format!("{}({})", self.name(), self.params().join(", "))
    }

    /// Human-readable description for a screen of the given size.
    pub fn describe(self, width: u32, height: u32) -> String {
        match self {
            AtomicKind::OpenApp => "If the current screen is a Home or App screen, you can use this action to open the app named \"app_name\" on the visible on the current screen.".to_string(),
            AtomicKind::Tap => "Tap the position (x, y) in current screen.".to_string(),
            AtomicKind::Swipe => format!(
                "Swipe from position (x1, y1) to position (x2, y2). To swipe up or down to review more content, you can adjust the y-coordinate offset based on the desired scroll distance. For example, setting x1 = x2 = {}, y1 = {}, and y2 = {} will swipe upwards to review additional content below. To swipe left or right in the App switcher screen to choose between open apps, set the x-coordinate offset to at least {}.",
                width / 2,
                height / 2,
                height / 10,
                width / 2
            ),
            AtomicKind::Type => "Type the \"text\" in an input box.".to_string(),
            AtomicKind::Enter => "Press the Enter key after typing (useful for searching).".to_string(),
            AtomicKind::SwitchApp => "Show the App switcher for switching between opened apps.".to_string(),
            AtomicKind::Back => "Return to the previous state.".to_string(),
            AtomicKind::Home => "Return to home page.".to_string(),
            AtomicKind::Wait => "Wait for 10 seconds to give more time for loading.".to_string(),
        }
    }

    /// The action list as shown to the Actor.
    ///
    /// Keyboard-only actions are left out while no keyboard is shown.
    pub fn catalog(width: u32, height: u32, keyboard_active: bool) -> String {
        Self::ALL
            .into_iter()
            .filter(|kind| keyboard_active || !kind.requires_keyboard())
            .map(|kind| format!("- {}: {}\n", kind.signature(), kind.describe(width, height)))
            .collect()
    }
}

impl fmt::Display for AtomicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully-resolved atomic action, ready for the device.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicAction {
    OpenApp { app_name: String },
    Tap { x: i32, y: i32 },
    Swipe { x1: i32, y1: i32, x2: i32, y2: i32 },
    Type { text: String },
    Enter,
    SwitchApp,
    Back,
    Home,
    Wait,
}

impl AtomicAction {
    /// Build an action from model-supplied arguments.
    ///
    /// Coordinates accept JSON numbers and numeric strings. Extra arguments
    /// are ignored.
    pub fn from_call(kind: AtomicKind, args: &Map<String, Value>) -> Result<Self, ActionError> {
        let action = kind.name();
        let int = |param: &'static str| coerce_int(action, param, args.get(param));
        let text = |param: &'static str| coerce_text(action, param, args.get(param));

        Ok(match kind {
            AtomicKind::OpenApp => AtomicAction::OpenApp {
                app_name: text("app_name")?.trim().to_string(),
            },
            AtomicKind::Tap => AtomicAction::Tap {
                x: int("x")?,
                y: int("y")?,
            },
            AtomicKind::Swipe => AtomicAction::Swipe {
                x1: int("x1")?,
                y1: int("y1")?,
                x2: int("x2")?,
                y2: int("y2")?,
            },
            AtomicKind::Type => AtomicAction::Type { text: text("text")? },
            AtomicKind::Enter => AtomicAction::Enter,
            AtomicKind::SwitchApp => AtomicAction::SwitchApp,
            AtomicKind::Back => AtomicAction::Back,
            AtomicKind::Home => AtomicAction::Home,
            AtomicKind::Wait => AtomicAction::Wait,
        })
    }

    pub fn kind(&self) -> AtomicKind {
        match self {
            AtomicAction::OpenApp { .. } => AtomicKind::OpenApp,
            AtomicAction::Tap { .. } => AtomicKind::Tap,
            AtomicAction::Swipe { .. } => AtomicKind::Swipe,
            AtomicAction::Type { .. } => AtomicKind::Type,
            AtomicAction::Enter => AtomicKind::Enter,
            AtomicAction::SwitchApp => AtomicKind::SwitchApp,
            AtomicAction::Back => AtomicKind::Back,
            AtomicAction::Home => AtomicKind::Home,
            AtomicAction::Wait => AtomicKind::Wait,
        }
    }
}

impl fmt::Display for AtomicAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomicAction::OpenApp { app_name } => write!(f, "Open_App({:?})", app_name),
            AtomicAction::Tap { x, y } => write!(f, "Tap({}, {})", x, y),
            AtomicAction::Swipe { x1, y1, x2, y2 } => {
                write!(f, "Swipe({}, {}, {}, {})", x1, y1, x2, y2)
            }
            AtomicAction::Type { text } => write!(f, "Type({:?})", text),
            other => write!(f, "{}()", other.kind().name()),
        }
    }
}

fn coerce_int(
    action: &'static str,
    param: &'static str,
    value: Option<&Value>,
) -> Result<i32, ActionError> {
    let value = value.ok_or(ActionError::MissingParameter { action, param })?;
    let invalid = || ActionError::InvalidArgument {
        action,
        param,
        value: value.to_string(),
    };

    let number = match value {
        Value::Number(n) => n
            .as_i64()
            .map(|i| i as f64)
            .or_else(|| n.as_f64())
            .ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if !number.is_finite() || number < i32::MIN as f64 || number > i32::MAX as f64 {
        return Err(invalid());
    }
    Ok(number.round() as i32)
}

fn coerce_text(
    action: &'static str,
    param: &'static str,
    value: Option<&Value>,
) -> Result<String, ActionError> {
    match value {
        None | Some(Value::Null) => Err(ActionError::MissingParameter { action, param }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(ActionError::InvalidArgument {
            action,
            param,
            value: other.to_string(),
        }),
    }
}
