//! [`DeviceController`] and [`Perceiver`] backed by a real adb connection.

use super::{device, hierarchy, input, screenshot};
use crate::device::{DeviceController, DeviceError, PerceptionItem, Perceiver, Screenshot};

/// A phone reachable through adb.
///
/// # Example
/// ```rust,no_run
/// use phone_agent_e::adb::AdbDevice;
/// use phone_agent_e::device::DeviceController;
///
/// let device = AdbDevice::new(Some("emulator-5554".to_string()));
/// device.home().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct AdbDevice {
    device_id: Option<String>,
}

impl AdbDevice {
    /// Create a handle for the given device, or the only attached one.
    pub fn new(device_id: Option<String>) -> Self {
        Self { device_id }
    }

    /// The adb serial this handle targets, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}

impl DeviceController for AdbDevice {
    fn tap(&self, x: i32, y: i32) -> Result<(), DeviceError> {
        Ok(device::tap(x, y, self.device_id())?)
    }

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<(), DeviceError> {
        Ok(device::swipe(x1, y1, x2, y2, self.device_id())?)
    }

    fn type_text(&self, text: &str) -> Result<(), DeviceError> {
        Ok(input::type_text_with_keyboard_handling(text, self.device_id())?)
    }

    fn enter(&self) -> Result<(), DeviceError> {
        Ok(device::enter(self.device_id())?)
    }

    fn back(&self) -> Result<(), DeviceError> {
        Ok(device::back(self.device_id())?)
    }

    fn home(&self) -> Result<(), DeviceError> {
        Ok(device::home(self.device_id())?)
    }

    fn switch_app(&self) -> Result<(), DeviceError> {
        Ok(device::switch_app(self.device_id())?)
    }

    fn capture_screenshot(&self) -> Result<Screenshot, DeviceError> {
        Ok(screenshot::get_screenshot(self.device_id()))
    }
}

impl Perceiver for AdbDevice {
    fn detect(&self, _screenshot: &Screenshot) -> Result<Vec<PerceptionItem>, DeviceError> {
        hierarchy::dump_perception(self.device_id())
            .map_err(|e| DeviceError::Perception(e.to_string()))
    }

    fn keyboard_active(&self) -> bool {
        match hierarchy::is_keyboard_shown(self.device_id()) {
            Ok(shown) => shown,
            Err(e) => {
                tracing::warn!("Keyboard state unavailable, assuming hidden: {}", e);
                false
            }
        }
    }
}
