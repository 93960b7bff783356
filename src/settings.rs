//! Persisted settings for the Phone Agent CLI.
//! Stored in the platform-specific config directory via `directories::ProjectDirs`,
//! then overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::agent::{AgentConfig, DEFAULT_ERR_TO_MANAGER_THRESH};
use crate::model::{ModelConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "moderras", "phone-agent-e")
}

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Model API base URL
    pub base_url: String,
    /// Model API key
    pub api_key: String,
    /// Model name
    pub model_name: String,
    /// ADB device ID (optional)
    pub device_id: String,
    /// Language code ("cn" or "en")
    pub lang: String,
    /// Maximum retries for model requests
    pub max_retries: u32,
    /// Retry delay in seconds
    pub retry_delay: u64,
    /// Maximum loop cycles per task
    pub max_steps: u32,
    pub err_to_manager_thresh: usize,
    pub max_consecutive_failures: usize,
    pub max_repetitive_actions: usize,
    pub enable_retrieval: bool,
    pub enable_curation: bool,
    /// Multiplier for post-action settle delays
    pub settle_scale: f64,
    /// Experience store file; empty means the platform data dir
    pub experience_path: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        let agent = AgentConfig::default();
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "EMPTY".to_string(),
            model_name: "gpt-4o".to_string(),
            device_id: String::new(),
            lang: agent.lang,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            max_steps: agent.max_steps,
            err_to_manager_thresh: DEFAULT_ERR_TO_MANAGER_THRESH,
            max_consecutive_failures: agent.max_consecutive_failures,
            max_repetitive_actions: agent.max_repetitive_actions,
            enable_retrieval: agent.enable_retrieval,
            enable_curation: agent.enable_curation,
            settle_scale: agent.settle_scale,
            experience_path: String::new(),
        }
    }
}

impl AppSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Default experience store location.
    pub fn default_experience_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.data_dir().join("experience.json"))
            .unwrap_or_else(|| PathBuf::from("experience.json"))
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Load settings and apply environment overrides.
    pub fn load_with_env() -> Self {
        let mut settings = Self::load();
        settings.apply_env(|key| env::var(key).ok());
        settings
    }

    /// Override fields from `lookup`; unparseable numbers are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MODEL_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("MODEL_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = lookup("ADB_DEVICE_ID") {
            self.device_id = v;
        }
        if let Some(v) = lookup("AGENT_LANG") {
            self.lang = v;
        }
        if let Some(v) = lookup("MODEL_MAX_RETRIES").and_then(|s| s.parse().ok()) {
            self.max_retries = v;
        }
        if let Some(v) = lookup("MODEL_RETRY_DELAY").and_then(|s| s.parse().ok()) {
            self.retry_delay = v;
        }
        if let Some(v) = lookup("AGENT_MAX_STEPS").and_then(|s| s.parse().ok()) {
            self.max_steps = v;
        }
        if let Some(v) = lookup("EXPERIENCE_PATH") {
            self.experience_path = v;
        }
        if let Some(v) = lookup("SETTLE_SCALE").and_then(|s| s.parse().ok()) {
            self.settle_scale = v;
        }
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<PathBuf, String> {
        let dir = Self::config_dir().ok_or("Cannot determine config directory")?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let path = dir.join("settings.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(&path, content).map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(path)
    }

    pub fn experience_path(&self) -> PathBuf {
        if self.experience_path.trim().is_empty() {
            Self::default_experience_path()
        } else {
            PathBuf::from(&self.experience_path)
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::default()
            .with_base_url(&self.base_url)
            .with_api_key(&self.api_key)
            .with_model_name(&self.model_name)
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }

    pub fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::default()
            .with_lang(&self.lang)
            .with_max_steps(self.max_steps)
            .with_err_threshold(self.err_to_manager_thresh)
            .with_guards(self.max_consecutive_failures, self.max_repetitive_actions)
            .with_retrieval(self.enable_retrieval)
            .with_curation(self.enable_curation)
            .with_settle_scale(self.settle_scale);
        if !self.device_id.trim().is_empty() {
            config = config.with_device_id(self.device_id.trim());
        }
        config
    }
}
