//! Persistent experience: learned shortcuts and tips shared across tasks.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::actions::{seed_shortcuts, ShortcutDef};

/// Tips every fresh store starts with.
pub const SEED_TIPS: &str = "0. Do not add any payment information. If you are asked to sign in, ignore it or sign in as a guest if possible. Close any pop-up windows when opening an app.\n\
1. By default, no apps are opened in the background.\n\
2. Screenshots may show partial text in text boxes from your previous input; this does not count as an error.\n\
3. When creating new Notes, you do not need to enter a title unless the user specifically requests it.";

/// Experience store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Shortcut '{0}' already exists")]
    DuplicateShortcut(String),
}

/// Everything learned so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default, deserialize_with = "valid_shortcuts")]
    pub shortcuts: BTreeMap<String, ShortcutDef>,
    #[serde(default)]
    pub tips: String,
    /// Version for future compatibility.
    #[serde(default = "default_version")]
    pub version: String,
    /// Last update timestamp (RFC 3339).
    #[serde(default)]
    pub last_updated: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for Experience {
    fn default() -> Self {
        Self {
            shortcuts: BTreeMap::new(),
            tips: String::new(),
            version: default_version(),
            last_updated: String::new(),
        }
    }
}

impl Experience {
    /// The store a first run starts from.
    pub fn seeded() -> Self {
        Self {
            shortcuts: seed_shortcuts(),
            tips: SEED_TIPS.to_string(),
            last_updated: Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty() && self.tips.trim().is_empty()
    }

    /// Register a new shortcut. Existing names are never overwritten.
    pub fn add_shortcut(&mut self, shortcut: ShortcutDef) -> Result<(), StoreError> {
        if self.shortcuts.contains_key(&shortcut.name) {
            return Err(StoreError::DuplicateShortcut(shortcut.name));
        }
        self.shortcuts.insert(shortcut.name.clone(), shortcut);
        self.touch();
        Ok(())
    }

    /// Replace the tip corpus.
    pub fn update_tips(&mut self, tips: impl Into<String>) {
        self.tips = tips.into();
        self.touch();
    }

    /// The named shortcuts, in the given order; unknown and repeated names are skipped.
    pub fn select_shortcuts<S: AsRef<str>>(&self, names: &[S]) -> Vec<ShortcutDef> {
        let mut selected: Vec<ShortcutDef> = Vec::new();
        for def in names.iter().filter_map(|name| self.shortcuts.get(name.as_ref())) {
            if !selected.iter().any(|s| s.name == def.name) {
                selected.push(def.clone());
            }
        }
        selected
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now().to_rfc3339();
    }
}

/// Drop stored shortcuts that no longer validate instead of failing the whole load.
fn valid_shortcuts<'de, D>(deserializer: D) -> Result<BTreeMap<String, ShortcutDef>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<ShortcutDef>(value) {
            Ok(def) => Some((def.name.clone(), def)),
            Err(e) => {
                tracing::warn!(shortcut = %key, "Skipping invalid stored shortcut: {}", e);
                None
            }
        })
        .collect())
}

/// Where experience lives between tasks.
pub trait ExperienceStore {
    fn load(&self) -> Result<Experience, StoreError>;
    fn save(&self, experience: &Experience) -> Result<(), StoreError>;
}

/// Experience persisted as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonExperienceStore {
    path: PathBuf,
}

impl JsonExperienceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExperienceStore for JsonExperienceStore {
    /// A missing file yields the seeded experience.
    fn load(&self) -> Result<Experience, StoreError> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No experience file yet, using seed");
            return Ok(Experience::seeded());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, experience: &Experience) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(experience)?;
        fs::write(&self.path, content)?;
        tracing::debug!(path = %self.path.display(), shortcuts = experience.shortcuts.len(), "Saved experience");
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryExperienceStore {
    experience: Mutex<Option<Experience>>,
}

impl InMemoryExperienceStore {
    pub fn new(experience: Experience) -> Self {
        Self {
            experience: Mutex::new(Some(experience)),
        }
    }

    /// The last saved experience, if any.
    pub fn snapshot(&self) -> Option<Experience> {
        self.experience
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ExperienceStore for InMemoryExperienceStore {
    fn load(&self) -> Result<Experience, StoreError> {
        Ok(self.snapshot().unwrap_or_else(Experience::seeded))
    }

    fn save(&self, experience: &Experience) -> Result<(), StoreError> {
        *self
            .experience
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(experience.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_path;
    use serde_json::json;

    #[test]
    fn test_seeded_experience() {
        let experience = Experience::seeded();
        assert!(experience.shortcuts.contains_key("Tap_Type_and_Enter"));
        assert!(!experience.tips.is_empty());
        assert!(!experience.is_empty());
        assert!(Experience::default().is_empty());
    }

    #[test]
    fn test_duplicate_shortcut_rejected() {
        let mut experience = Experience::seeded();
        let before = experience.clone();
        let mut duplicate = ShortcutDef::tap_type_and_enter();
        duplicate.description = "something else".to_string();

        let err = experience.add_shortcut(duplicate).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateShortcut(ref name) if name == "Tap_Type_and_Enter"));
        assert_eq!(experience.shortcuts, before.shortcuts);
    }

    #[test]
    fn test_select_shortcuts_skips_unknown() {
        let experience = Experience::seeded();
        let selected = experience.select_shortcuts(&["Missing", "Tap_Type_and_Enter", "Tap_Type_and_Enter"]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Tap_Type_and_Enter");
    }

    #[test]
    fn test_json_store_roundtrip_and_missing_file() {
        let path = temp_path("experience.json");
        let store = JsonExperienceStore::new(&path);

        let fresh = store.load().unwrap();
        assert_eq!(fresh.shortcuts, seed_shortcuts());

        let mut experience = fresh;
        experience.update_tips("Always close pop-ups first.");
        store.save(&experience).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.tips, "Always close pop-ups first.");
        assert_eq!(loaded.shortcuts, experience.shortcuts);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_stored_shortcut_is_skipped() {
        let stored = json!({
            "shortcuts": {
                "Broken": {"name": "Broken", "atomic_action_sequence": [{"name": "Scroll"}]},
                "Go_Home": {"name": "Go_Home", "atomic_action_sequence": [{"name": "Home", "arguments_map": {}}]}
            },
            "tips": "tip"
        });
        let experience: Experience = serde_json::from_value(stored).unwrap();
        assert_eq!(experience.shortcuts.len(), 1);
        assert!(experience.shortcuts.contains_key("Go_Home"));
        assert_eq!(experience.version, "1.0");
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryExperienceStore::default();
        assert_eq!(store.load().unwrap().shortcuts, seed_shortcuts());
        store.save(&Experience::default()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
