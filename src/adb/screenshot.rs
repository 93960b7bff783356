//! Screenshot utilities for capturing Android device screen.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, RgbImage};
use std::io::Cursor;

use super::connection::run_adb;
use crate::device::{Screenshot, DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Capture a screenshot from the connected Android device.
///
/// Uses `adb exec-out screencap -p` so the PNG streams straight to stdout.
///
/// # Note
/// If the screenshot fails (e.g., on sensitive screens like payment pages),
/// a black fallback image is returned with `is_sensitive = true`.
pub fn get_screenshot(device_id: Option<&str>) -> Screenshot {
    let output = match run_adb(device_id, &["exec-out", "screencap", "-p"]) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Screenshot command failed: {}", e);
            return create_fallback_screenshot(false);
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("Status: -1") || stderr.contains("Failed") {
        tracing::warn!("Screenshot may have failed (sensitive screen): {}", stderr);
        return create_fallback_screenshot(true);
    }

    decode_png(&output.stdout).unwrap_or_else(|| create_fallback_screenshot(false))
}

/// Validate PNG bytes and wrap them into a [`Screenshot`].
fn decode_png(png_data: &[u8]) -> Option<Screenshot> {
    if png_data.len() < PNG_MAGIC.len() || &png_data[..PNG_MAGIC.len()] != PNG_MAGIC {
        tracing::error!("Invalid PNG data ({} bytes)", png_data.len());
        return None;
    }

    match image::load_from_memory(png_data) {
        Ok(img) => Some(Screenshot::new(
            STANDARD.encode(png_data),
            img.width(),
            img.height(),
            false,
        )),
        Err(e) => {
            tracing::error!("Failed to parse screenshot image: {}", e);
            None
        }
    }
}

/// Create a black fallback image when screenshot fails.
fn create_fallback_screenshot(is_sensitive: bool) -> Screenshot {
    let black_img = RgbImage::from_pixel(
        DEFAULT_SCREEN_WIDTH,
        DEFAULT_SCREEN_HEIGHT,
        image::Rgb([0u8, 0u8, 0u8]),
    );
    let dynamic_img = DynamicImage::ImageRgb8(black_img);

    let mut buffer = Cursor::new(Vec::new());
    let _ = dynamic_img.write_to(&mut buffer, image::ImageFormat::Png);
    let base64_data = STANDARD.encode(buffer.into_inner());

    Screenshot::new(
        base64_data,
        DEFAULT_SCREEN_WIDTH,
        DEFAULT_SCREEN_HEIGHT,
        is_sensitive,
    )
}
