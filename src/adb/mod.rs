//! ADB (Android Debug Bridge) module for device interaction.

mod connection;
mod controller;
pub mod device;
pub mod hierarchy;
pub mod input;
mod screenshot;

pub use connection::{ADBConnection, AdbError, ConnectionType, DeviceInfo};
pub use controller::AdbDevice;
pub use screenshot::get_screenshot;
