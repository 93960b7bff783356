//! Device-side collaborators: input primitives, screenshots and perception.
//!
//! The control loop only talks to a phone through the two traits in this
//! module. [`crate::adb::AdbDevice`] is the production implementation; tests
//! drive the loop with a scripted fake.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default screen width used before the first screenshot is taken.
pub const DEFAULT_SCREEN_WIDTH: u32 = 1080;

/// Default screen height used before the first screenshot is taken.
pub const DEFAULT_SCREEN_HEIGHT: u32 = 2340;

/// Device collaborator errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Device command failed: {0}")]
    CommandFailed(String),
    #[error("Screenshot capture failed: {0}")]
    Screenshot(String),
    #[error("Perception failed: {0}")]
    Perception(String),
}

/// Represents a captured screenshot.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub base64_data: String,
    pub width: u32,
    pub height: u32,
    pub is_sensitive: bool,
}

impl Screenshot {
    /// Create a new screenshot.
    pub fn new(base64_data: String, width: u32, height: u32, is_sensitive: bool) -> Self {
        Self {
            base64_data,
            width,
            height,
            is_sensitive,
        }
    }
}

/// Location of a detected on-screen element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Point([i32; 2]),
    BoundingBox([i32; 4]),
}

impl Coordinates {
    /// Center of the element.
    pub fn center(&self) -> (i32, i32) {
        match *self {
            Coordinates::Point([x, y]) => (x, y),
            Coordinates::BoundingBox([x1, y1, x2, y2]) => ((x1 + x2) / 2, (y1 + y2) / 2),
        }
    }

    /// Height of the element, zero for points.
    pub fn height(&self) -> i32 {
        match *self {
            Coordinates::Point(_) => 0,
            Coordinates::BoundingBox([_, y1, _, y2]) => (y2 - y1).abs(),
        }
    }

    /// Whether this is the (0, 0) placeholder some detectors emit.
    pub fn is_origin(&self) -> bool {
        matches!(self, Coordinates::Point([0, 0]))
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinates::Point([x, y]) => write!(f, "[{}, {}]", x, y),
            Coordinates::BoundingBox([x1, y1, x2, y2]) => {
                write!(f, "[{}, {}, {}, {}]", x1, y1, x2, y2)
            }
        }
    }
}

/// One detected on-screen element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionItem {
    pub coordinates: Coordinates,
    pub text: String,
    /// The box covers only a text label, not the element it names.
    #[serde(default)]
    pub label_only: bool,
}

impl PerceptionItem {
    /// An element whose box covers the whole tappable node.
    pub fn new(coordinates: Coordinates, text: impl Into<String>) -> Self {
        Self {
            coordinates,
            text: text.into(),
            label_only: false,
        }
    }

    /// A detected text label, as OCR reports it.
    pub fn label(coordinates: Coordinates, text: impl Into<String>) -> Self {
        Self {
            label_only: true,
            ..Self::new(coordinates, text)
        }
    }

    /// Where to tap to launch the app this item names.
    ///
    /// Launcher labels sit under their icon, so a label-only box is tapped
    /// one label height above its center. Whole nodes are tapped at the center.
    pub fn app_icon_point(&self) -> (i32, i32) {
        let (x, y) = self.coordinates.center();
        if self.label_only {
            (x, y - self.coordinates.height())
        } else {
            (x, y)
        }
    }

    /// Whether the item carries anything worth showing to a decision unit.
    pub fn is_informative(&self) -> bool {
        let text = self.text.trim();
        !text.is_empty() && text != "icon: None" && !self.coordinates.is_origin()
    }
}

/// Input primitives and screen capture.
///
/// Every primitive is fire-and-forget: the caller is responsible for waiting
/// for the screen to settle. Implementations are not reentrant.
pub trait DeviceController {
    fn tap(&self, x: i32, y: i32) -> Result<(), DeviceError>;
    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<(), DeviceError>;
    fn type_text(&self, text: &str) -> Result<(), DeviceError>;
    fn enter(&self) -> Result<(), DeviceError>;
    fn back(&self) -> Result<(), DeviceError>;
    fn home(&self) -> Result<(), DeviceError>;
    fn switch_app(&self) -> Result<(), DeviceError>;
    fn capture_screenshot(&self) -> Result<Screenshot, DeviceError>;
}

/// Best-effort screen understanding.
pub trait Perceiver {
    /// Detect text and interactive elements on the given screenshot.
    fn detect(&self, screenshot: &Screenshot) -> Result<Vec<PerceptionItem>, DeviceError>;

    /// Whether a soft keyboard is currently shown.
    fn keyboard_active(&self) -> bool;
}
