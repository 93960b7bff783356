//! View-hierarchy based perception.
//!
//! Instead of OCR, on-screen text and icon labels are taken from a
//! `uiautomator dump` of the current window. Keyboard visibility comes from
//! `dumpsys input_method`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::connection::{run_adb, AdbError};
use crate::device::{Coordinates, PerceptionItem};

const DUMP_PATH: &str = "/sdcard/window_dump.xml";

static NODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<node\b[^>]*>").expect("valid regex"));
static TEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\btext="([^"]*)""#).expect("valid regex"));
static DESC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bcontent-desc="([^"]*)""#).expect("valid regex"));
static BOUNDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bbounds="\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]""#).expect("valid regex")
});

/// Dump the current window hierarchy and extract labelled elements.
pub fn dump_perception(device_id: Option<&str>) -> Result<Vec<PerceptionItem>, AdbError> {
    run_adb(device_id, &["shell", "uiautomator", "dump", DUMP_PATH])?;
    let output = run_adb(device_id, &["exec-out", "cat", DUMP_PATH])?;
    Ok(parse_hierarchy(&String::from_utf8_lossy(&output.stdout)))
}

/// Whether the soft keyboard is currently shown.
pub fn is_keyboard_shown(device_id: Option<&str>) -> Result<bool, AdbError> {
    let output = run_adb(device_id, &["shell", "dumpsys", "input_method"])?;
    Ok(parse_keyboard_shown(&String::from_utf8_lossy(&output.stdout)))
}

/// Extract `(bounds, label)` pairs from uiautomator XML, in document order.
///
/// Nodes with visible text produce the text itself; nodes with only a
/// content description produce an `icon: <desc>` label.
pub fn parse_hierarchy(xml: &str) -> Vec<PerceptionItem> {
    NODE_RE
        .find_iter(xml)
        .filter_map(|node| {
            let node = node.as_str();
            let bounds = BOUNDS_RE.captures(node)?;
            let coord = |i: usize| bounds[i].parse::<i32>().ok();
            let coordinates =
                Coordinates::BoundingBox([coord(1)?, coord(2)?, coord(3)?, coord(4)?]);

            let text = TEXT_RE
                .captures(node)
                .map(|c| unescape_xml(&c[1]))
                .unwrap_or_default();
            let label = if !text.trim().is_empty() {
                text
            } else {
                let desc = DESC_RE
                    .captures(node)
                    .map(|c| unescape_xml(&c[1]))
                    .unwrap_or_default();
                if desc.trim().is_empty() {
                    return None;
                }
                format!("icon: {}", desc)
            };

            Some(PerceptionItem::new(coordinates, label.trim()))
        })
        .collect()
}

fn parse_keyboard_shown(dumpsys: &str) -> bool {
    dumpsys
        .lines()
        .any(|line| line.contains("mInputShown=true"))
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" content-desc="" bounds="[0,0][1080,2340]">
    <node index="1" text="Search &amp; explore" class="android.widget.EditText" content-desc="" bounds="[40,120][1040,220]" />
    <node index="2" text="" class="android.widget.ImageButton" content-desc="Settings" bounds="[960,60][1060,160]" />
    <node index="3" text="" class="android.view.View" content-desc="" bounds="[0,300][1080,900]" />
  </node>
</hierarchy>"#;

    #[test]
    fn test_parse_hierarchy_extracts_text_and_icons() {
        let items = parse_hierarchy(SAMPLE);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].text, "Search & explore");
        assert_eq!(items[0].coordinates, Coordinates::BoundingBox([40, 120, 1040, 220]));

        assert_eq!(items[1].text, "icon: Settings");
        assert_eq!(items[1].coordinates.center(), (1010, 110));
    }

    #[test]
    fn test_parse_hierarchy_empty_input() {
        assert!(parse_hierarchy("").is_empty());
        assert!(parse_hierarchy("ERROR: null root node returned by UiTestAutomationBridge.").is_empty());
    }

    #[test]
    fn test_parse_keyboard_shown() {
        let shown = "  mServedInputConnection=...\n  mInputShown=true\n  mShowRequested=true";
        let hidden = "  mInputShown=false\n";
        assert!(parse_keyboard_shown(shown));
        assert!(!parse_keyboard_shown(hidden));
    }
}
