//! ADB command plumbing and device discovery.

use std::process::{Command, Output};
use thiserror::Error;

use crate::device::DeviceError;

/// Type of ADB connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Wifi,
    Remote,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

/// ADB errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("Failed to spawn adb: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

impl From<AdbError> for DeviceError {
    fn from(err: AdbError) -> Self {
        DeviceError::CommandFailed(err.to_string())
    }
}

/// Lists devices visible to the local ADB server.
///
/// # Example
/// ```rust,no_run
/// use phone_agent_e::adb::ADBConnection;
///
/// let conn = ADBConnection::new();
/// for device in conn.list_devices().unwrap_or_default() {
///     println!("{} ({})", device.device_id, device.status);
/// }
/// ```
pub struct ADBConnection {
    adb_path: String,
}

impl Default for ADBConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ADBConnection {
    /// Create a new ADB connection manager with default path.
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
        }
    }

    /// List all connected devices.
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let output = Command::new(&self.adb_path).args(["devices", "-l"]).output()?;
        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the output of `adb devices -l`.
fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let device_id = parts[0].to_string();
            let connection_type = if device_id.contains(':') {
                ConnectionType::Remote
            } else if line.contains("usb:") {
                ConnectionType::Usb
            } else {
                ConnectionType::Wifi
            };
            let model = parts
                .iter()
                .find(|p| p.starts_with("model:"))
                .map(|m| m.trim_start_matches("model:").to_string());

            Some(DeviceInfo {
                device_id,
                status: parts[1].to_string(),
                connection_type,
                model,
            })
        })
        .collect()
}

/// Get ADB command prefix with optional device specifier.
pub(crate) fn get_adb_prefix(device_id: Option<&str>) -> Vec<String> {
    match device_id {
        Some(id) => vec!["adb".to_string(), "-s".to_string(), id.to_string()],
        None => vec!["adb".to_string()],
    }
}

/// Run an adb command against the selected device and fail on non-zero exit.
pub(crate) fn run_adb(device_id: Option<&str>, args: &[&str]) -> Result<Output, AdbError> {
    let prefix = get_adb_prefix(device_id);
    let output = Command::new(&prefix[0])
        .args(&prefix[1..])
        .args(args)
        .output()?;

    if !output.status.success() {
        return Err(AdbError::CommandFailed {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_adb_prefix() {
        let prefix = get_adb_prefix(None);
        assert_eq!(prefix, vec!["adb"]);

        let prefix_with_device = get_adb_prefix(Some("device123"));
        assert_eq!(prefix_with_device, vec!["adb", "-s", "device123"]);
    }

    #[test]
    fn test_parse_device_list() {
        let stdout = "List of devices attached\n\
            emulator-5554          device product:sdk model:Pixel_7 usb:1-1\n\
            192.168.1.9:5555       device model:Mi_11\n\n";
        let devices = parse_device_list(stdout);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id, "emulator-5554");
        assert_eq!(devices[0].connection_type, ConnectionType::Usb);
        assert_eq!(devices[0].model.as_deref(), Some("Pixel_7"));
        assert_eq!(devices[1].connection_type, ConnectionType::Remote);
    }

    #[test]
    fn test_adb_error_converts_to_device_error() {
        let err = AdbError::CommandFailed {
            command: "shell input tap 1 2".to_string(),
            stderr: "device offline".to_string(),
        };
        let device_err: DeviceError = err.into();
        assert!(device_err.to_string().contains("device offline"));
    }
}
