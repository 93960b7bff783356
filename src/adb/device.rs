//! Input primitives for Android automation.
//!
//! These are fire-and-forget: they return as soon as adb accepts the command.
//! Waiting for the screen to settle is the dispatcher's job.

use super::connection::{run_adb, AdbError};

/// Default swipe duration in milliseconds.
const SWIPE_DURATION_MS: u32 = 500;

/// Tap at the specified coordinates.
pub fn tap(x: i32, y: i32, device_id: Option<&str>) -> Result<(), AdbError> {
    run_adb(
        device_id,
        &["shell", "input", "tap", &x.to_string(), &y.to_string()],
    )?;
    Ok(())
}

/// Swipe from start to end coordinates.
pub fn swipe(
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    device_id: Option<&str>,
) -> Result<(), AdbError> {
    run_adb(
        device_id,
        &[
            "shell",
            "input",
            "swipe",
            &start_x.to_string(),
            &start_y.to_string(),
            &end_x.to_string(),
            &end_y.to_string(),
            &SWIPE_DURATION_MS.to_string(),
        ],
    )?;
    Ok(())
}

/// Send a key event (e.g. `KEYCODE_ENTER`).
pub fn key_event(keycode: &str, device_id: Option<&str>) -> Result<(), AdbError> {
    run_adb(device_id, &["shell", "input", "keyevent", keycode])?;
    Ok(())
}

/// Press the enter key.
pub fn enter(device_id: Option<&str>) -> Result<(), AdbError> {
    key_event("KEYCODE_ENTER", device_id)
}

/// Press the back button.
pub fn back(device_id: Option<&str>) -> Result<(), AdbError> {
    key_event("KEYCODE_BACK", device_id)
}

/// Press the home button.
pub fn home(device_id: Option<&str>) -> Result<(), AdbError> {
    key_event("KEYCODE_HOME", device_id)
}

/// Open the recent-apps switcher.
pub fn switch_app(device_id: Option<&str>) -> Result<(), AdbError> {
    key_event("KEYCODE_APP_SWITCH", device_id)
}
