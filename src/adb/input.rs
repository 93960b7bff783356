//! Text input through ADB Keyboard.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::thread;
use std::time::Duration;

use super::connection::{run_adb, AdbError};

const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";

/// Type text into the currently focused input field using ADB Keyboard.
///
/// # Note
/// Requires ADB Keyboard to be installed on the device.
/// See: https://github.com/senzhk/ADBKeyBoard
pub fn type_text(text: &str, device_id: Option<&str>) -> Result<(), AdbError> {
    let encoded_text = STANDARD.encode(text.as_bytes());
    run_adb(
        device_id,
        &[
            "shell",
            "am",
            "broadcast",
            "-a",
            "ADB_INPUT_B64",
            "--es",
            "msg",
            &encoded_text,
        ],
    )?;
    Ok(())
}

/// Switch to ADB Keyboard if needed, returning the previous IME for restoration.
pub fn detect_and_set_adb_keyboard(device_id: Option<&str>) -> Result<String, AdbError> {
    let output = run_adb(
        device_id,
        &["shell", "settings", "get", "secure", "default_input_method"],
    )?;
    let current_ime = String::from_utf8_lossy(&output.stdout).trim().to_string();

    if !current_ime.contains(ADB_KEYBOARD_IME) {
        run_adb(device_id, &["shell", "ime", "set", ADB_KEYBOARD_IME])?;
    }

    Ok(current_ime)
}

/// Restore the original keyboard IME.
pub fn restore_keyboard(ime: &str, device_id: Option<&str>) -> Result<(), AdbError> {
    if ime.is_empty() || ime.contains(ADB_KEYBOARD_IME) {
        return Ok(());
    }
    run_adb(device_id, &["shell", "ime", "set", ime])?;
    Ok(())
}

/// Type text with full keyboard handling (switch, type, restore).
///
/// Existing field content is not cleared.
pub fn type_text_with_keyboard_handling(text: &str, device_id: Option<&str>) -> Result<(), AdbError> {
    let original_ime = detect_and_set_adb_keyboard(device_id)?;
    thread::sleep(Duration::from_millis(500));

    let typed = type_text(text, device_id);
    thread::sleep(Duration::from_millis(500));

    // Restore even when typing failed so the user keeps their keyboard.
    restore_keyboard(&original_ime, device_id)?;
    typed
}
